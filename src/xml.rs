//! Flat XML codec: `<xml><key>value</key>...</xml>`.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::Result;
use crate::error::Error;
use crate::mch::Payload;

const ROOT: &str = "xml";

/// Serializes `payload` as children of an `<xml>` root, in key order.
///
/// Every key must be a valid XML element name.
pub fn to_string(payload: &Payload) -> Result<String> {
    if let Some((key, _)) = payload.iter().find(|(key, _)| !is_element_name(key)) {
        return Err(Error::validation(format!("invalid XML element name `{key}`")));
    }

    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Start(BytesStart::new(ROOT)))
        .map_err(Error::internal)?;
    for (key, value) in payload.iter() {
        writer
            .write_event(Event::Start(BytesStart::new(key)))
            .map_err(Error::internal)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(Error::internal)?;
        writer
            .write_event(Event::End(BytesEnd::new(key)))
            .map_err(Error::internal)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(Error::internal)?;

    String::from_utf8(writer.into_inner()).map_err(Error::internal)
}

/// Reads the direct children of the root element into a [`Payload`].
///
/// Text and CDATA content are both accepted and kept byte for byte, since
/// the reply signature covers values exactly as sent. Empty elements map to
/// an empty string. Text between the root's children and anything nested
/// deeper than one level is ignored.
pub fn from_str(xml: &str) -> Result<Payload> {
    let mut reader = Reader::from_str(xml);

    let mut payload = Payload::new();
    let mut depth = 0_usize;
    let mut field: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event().map_err(Error::internal)? {
            Event::Start(start) => {
                depth += 1;
                if depth == 2 {
                    field = Some(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                    value.clear();
                }
            }
            Event::Empty(empty) if depth == 1 => {
                payload.insert(String::from_utf8_lossy(empty.name().as_ref()), "");
            }
            Event::Text(text) if depth == 2 => {
                value.push_str(&text.unescape().map_err(Error::internal)?);
            }
            Event::CData(cdata) if depth == 2 => {
                value.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
            }
            Event::End(_) => {
                if depth == 2
                    && let Some(key) = field.take()
                {
                    payload.insert(key, std::mem::take(&mut value));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::validation("reply XML ended inside an element"));
    }

    Ok(payload)
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;
    use crate::mch::{Credential, sign, verify_reply};

    #[test]
    fn writes_sorted_children_of_root() {
        let payload = Payload::from_iter([("nonce_str", "abc"), ("appid", "wx1")]);

        assert_eq!(
            to_string(&payload).unwrap(),
            "<xml><appid>wx1</appid><nonce_str>abc</nonce_str></xml>"
        );
    }

    #[test]
    fn escapes_markup_in_values() {
        let payload = Payload::from_iter([("body", "a<b>&c")]);

        let xml = to_string(&payload).unwrap();
        assert_eq!(xml, "<xml><body>a&lt;b&gt;&amp;c</body></xml>");
        assert_eq!(from_str(&xml).unwrap(), payload);
    }

    #[test]
    fn reads_cdata_and_text_values() {
        let xml = "<xml>\n  <return_code><![CDATA[SUCCESS]]></return_code>\n  \
                   <return_msg><![CDATA[OK]]></return_msg>\n  <total_fee>1</total_fee>\n</xml>";

        let payload = from_str(xml).unwrap();
        assert_eq!(payload.get("return_code"), Some("SUCCESS"));
        assert_eq!(payload.get("return_msg"), Some("OK"));
        assert_eq!(payload.get("total_fee"), Some("1"));
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn empty_elements_read_as_empty_strings() {
        let payload = from_str("<xml><attach/><detail></detail><a>1</a></xml>").unwrap();

        assert_eq!(payload.get("attach"), Some(""));
        assert_eq!(payload.get("detail"), Some(""));
        assert_eq!(payload.get("a"), Some("1"));
    }

    #[test]
    fn ignores_nested_elements() {
        let payload = from_str("<xml><a>1</a><b><c>2</c></b></xml>").unwrap();

        assert_eq!(payload.get("a"), Some("1"));
        assert_eq!(payload.get("c"), None);
        assert_eq!(payload.get("b"), Some(""));
    }

    #[test]
    fn rejects_truncated_document() {
        assert!(from_str("<xml><a>1</a>").is_err());
    }

    #[test]
    fn surrounding_whitespace_in_values_is_kept() {
        let payload = Payload::from_iter([
            ("body", " padded "),
            ("blank", " "),
            ("detail", "trailing "),
            ("attach", "\n  leading"),
        ]);

        let read_back = from_str(&to_string(&payload).unwrap()).unwrap();

        assert_eq!(read_back, payload, "values must survive a round trip untouched");
    }

    #[test]
    fn whitespace_inside_cdata_is_kept() {
        let payload = from_str("<xml>\n  <body><![CDATA[ spaced ]]></body>\n</xml>").unwrap();

        assert_eq!(payload.get("body"), Some(" spaced "));
        assert_eq!(payload.len(), 1, "indentation must not become a field");
    }

    #[test]
    fn signed_reply_with_trailing_space_verifies() {
        let credential = Credential::new("wx2421b1c4370ec43b", "1900000109", "key");
        let mut reply = Payload::from_iter([
            ("return_code", "SUCCESS"),
            ("appid", "wx2421b1c4370ec43b"),
            ("mch_id", "1900000109"),
            ("body", "trailing "),
        ]);
        let signature = sign::sign(&reply, reply.sign_type().unwrap(), "key");
        reply.insert("sign", signature);

        let received = from_str(&to_string(&reply).unwrap()).unwrap();

        verify_reply(&received, &credential).unwrap();
    }

    #[test]
    fn invalid_element_names_are_rejected() {
        for key in ["", "a b", "1st", "<tag>"] {
            let err = to_string(&Payload::from_iter([(key, "v")])).unwrap_err();

            assert_eq!(err.kind(), Kind::Validation, "key `{key}` must be rejected");
        }

        assert!(
            to_string(&Payload::from_iter([("sign_type", "MD5"), ("a.b-c", "v")])).is_ok(),
            "underscores, dots and dashes are valid name characters"
        );
    }
}
