use quick_xml::events::BytesStart;
use quick_xml::name::{Namespace, ResolveResult};

/// 依 local name 取屬性值（忽略前綴）
pub fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, quick_xml::Error> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

pub fn namespace_of(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

/// `tns:Foo` -> `Foo`
pub fn local_part(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_part() {
        assert_eq!(local_part("tns:IsValidISBN13"), "IsValidISBN13");
        assert_eq!(local_part("IsValidISBN13"), "IsValidISBN13");
    }

    #[test]
    fn test_attr_ignores_prefix() {
        let element = BytesStart::from_content(
            r#"soap:operation soap:soapAction="urn:genSSHA" style="rpc""#,
            14,
        );
        assert_eq!(
            attr(&element, "soapAction").unwrap(),
            Some("urn:genSSHA".to_string())
        );
        assert_eq!(attr(&element, "style").unwrap(), Some("rpc".to_string()));
        assert_eq!(attr(&element, "missing").unwrap(), None);
        assert_eq!(local_name(&element), "operation");
    }
}
