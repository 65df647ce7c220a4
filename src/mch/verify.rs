use crate::Result;
use crate::error::Error;
use crate::mch::sign;
use crate::mch::types::{Credential, FIELD_APPID, FIELD_MCH_ID, FIELD_SIGN, Payload};

/// Checks an inbound payload against our credential.
///
/// Checks run in order and the first failure wins:
/// 1. `sign`, when present, must equal the signature recomputed with the
///    algorithm named by `sign_type` (MD5 if absent). Unsigned replies pass.
/// 2. `appid`, when present, must be ours.
/// 3. `mch_id`, when present, must be ours.
pub fn verify_reply(reply: &Payload, credential: &Credential) -> Result<()> {
    if let Some(actual) = reply.get(FIELD_SIGN) {
        let sign_type = reply.sign_type()?;
        let expected = sign::sign(reply, sign_type, credential.api_key());

        if expected != actual {
            return Err(Error::signature_mismatch(expected, actual.to_owned()));
        }
    }

    if let Some(appid) = reply.get(FIELD_APPID)
        && appid != credential.appid()
    {
        return Err(Error::identity_mismatch(
            FIELD_APPID,
            credential.appid(),
            appid,
        ));
    }

    if let Some(mch_id) = reply.get(FIELD_MCH_ID)
        && mch_id != credential.mch_id()
    {
        return Err(Error::identity_mismatch(
            FIELD_MCH_ID,
            credential.mch_id(),
            mch_id,
        ));
    }

    Ok(())
}
