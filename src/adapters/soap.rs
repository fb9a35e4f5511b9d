//! SOAP envelope codec.
//!
//! Responses are folded into `serde_json::Value`: prefixes and attributes are
//! dropped, repeated elements become arrays, and text mixed in with child
//! elements is kept under the `"$text"` key.

use crate::adapters::xml::local_name;
use crate::domain::model::{
    BindingStyle, CallRequest, OperationDescriptor, SoapVersion, TransportResponse,
};
use crate::utils::error::{ProxyError, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// 同時有子元素與文字時，文字存放的鍵
pub const TEXT_KEY: &str = "$text";

pub fn build_envelope(version: SoapVersion, body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="{}" xmlns:xsi="{}" xmlns:xsd="{}">"#,
            "<soap:Body>{}</soap:Body></soap:Envelope>"
        ),
        version.envelope_namespace(),
        XSI_NS,
        XSD_NS,
        body
    )
}

/// 預設的 body 產生方式：外層元素加上依宣告順序排列的參數，未宣告的參數接在後面。
/// document 風格的外層元素是 input part 指向的 schema element，rpc 風格則是操作名稱。
pub fn default_body(
    target_namespace: &str,
    operation: &OperationDescriptor,
    request: &CallRequest,
) -> Result<String> {
    let mut ordered: Vec<&(String, Value)> = operation
        .input_params
        .iter()
        .filter_map(|name| request.params.iter().find(|(key, _)| key == name))
        .collect();
    ordered.extend(
        request
            .params
            .iter()
            .filter(|(key, _)| !operation.input_params.contains(key)),
    );

    let mut body = String::new();
    match operation.style {
        // document/literal：參數繼承外層元素的預設命名空間
        BindingStyle::Document => {
            let (wrapper, namespace) = match &operation.input_element {
                Some(element) => (
                    element.name.as_str(),
                    element.namespace.as_deref().unwrap_or(target_namespace),
                ),
                None => (operation.name.as_str(), target_namespace),
            };
            check_element_name(wrapper)?;
            body.push_str(&format!("<{} xmlns=\"{}\">", wrapper, escape(namespace)));
            for (name, value) in ordered {
                write_value(&mut body, name, value)?;
            }
            body.push_str(&format!("</{}>", wrapper));
        }
        BindingStyle::Rpc => {
            check_element_name(&operation.name)?;
            body.push_str(&format!(
                "<tns:{} xmlns:tns=\"{}\">",
                operation.name,
                escape(target_namespace)
            ));
            for (name, value) in ordered {
                write_value(&mut body, name, value)?;
            }
            body.push_str(&format!("</tns:{}>", operation.name));
        }
    }
    Ok(body)
}

pub fn write_value(out: &mut String, name: &str, value: &Value) -> Result<()> {
    check_element_name(name)?;
    match value {
        Value::Null => out.push_str(&format!("<{}/>", name)),
        Value::Bool(flag) => out.push_str(&format!("<{0}>{1}</{0}>", name, flag)),
        Value::Number(number) => out.push_str(&format!("<{0}>{1}</{0}>", name, number)),
        Value::String(text) => out.push_str(&format!("<{0}>{1}</{0}>", name, escape(text.as_str()))),
        Value::Array(items) => {
            for item in items {
                write_value(out, name, item)?;
            }
        }
        Value::Object(fields) => {
            out.push_str(&format!("<{}>", name));
            for (key, field) in fields {
                write_value(out, key, field)?;
            }
            out.push_str(&format!("</{}>", name));
        }
    }
    Ok(())
}

/// 元素名稱必須是 XML NCName：字母或底線開頭，之後只能是字母、數字、`_`、`-`、`.`
fn check_element_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ProxyError::invalid_argument(format!(
            "'{}' is not a valid XML element name",
            name
        )))
    }
}

struct Node {
    name: String,
    text: String,
    children: Map<String, Value>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Map::new(),
        }
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn into_value(mut self) -> Value {
        if !self.children.is_empty() {
            if !self.text.is_empty() {
                self.children
                    .insert(TEXT_KEY.to_string(), Value::String(self.text));
            }
            Value::Object(self.children)
        } else if self.text.is_empty() {
            Value::Null
        } else {
            Value::String(self.text)
        }
    }
}

/// 把整份 XML 轉成 `{ "Envelope": { ... } }` 形式的值；前綴與屬性都會被丟掉
pub fn xml_to_value(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Node::new(String::new())];
    loop {
        match reader.read_event()? {
            Event::Start(element) => stack.push(Node::new(local_name(&element))),
            Event::Empty(element) => {
                if let Some(parent) = stack.last_mut() {
                    parent.add_child(local_name(&element), Value::Null);
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(node) = stack.pop() {
                        let name = node.name.clone();
                        if let Some(parent) = stack.last_mut() {
                            parent.add_child(name, node.into_value());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ProxyError::protocol("response ended inside an element"));
    }
    Ok(stack
        .pop()
        .map(Node::into_value)
        .unwrap_or(Value::Null))
}

/// 取出 SOAP Body 的內容
pub fn decode_body(xml: &str) -> Result<Value> {
    let document = xml_to_value(xml)?;
    document
        .get("Envelope")
        .and_then(|envelope| envelope.get("Body"))
        .cloned()
        .ok_or_else(|| ProxyError::protocol("response has no SOAP Body"))
}

/// Body 裡如果有 Fault（1.1 或 1.2 格式）就轉成錯誤
pub fn fault_from_body(body: &Value) -> Option<ProxyError> {
    let fault = body.get("Fault")?;

    let code = fault
        .get("faultcode")
        .or_else(|| fault.get("Code").and_then(|code| code.get("Value")))
        .and_then(Value::as_str)
        .unwrap_or("Server")
        .to_string();
    let message = fault
        .get("faultstring")
        .or_else(|| fault.get("Reason").and_then(|reason| reason.get("Text")))
        .and_then(Value::as_str)
        .unwrap_or("unknown fault")
        .to_string();

    Some(ProxyError::SoapFault { code, message })
}

/// 依照 Fault -> HTTP 狀態 -> Body 的順序解讀回應
pub fn interpret_response(response: &TransportResponse, url: &str) -> Result<Value> {
    let status_error = || ProxyError::HttpStatus {
        status: response.status,
        url: url.to_string(),
    };

    match decode_body(&response.body) {
        Ok(body) => {
            if let Some(fault) = fault_from_body(&body) {
                return Err(fault);
            }
            if !response.is_success() {
                return Err(status_error());
            }
            Ok(body)
        }
        Err(_) if !response.is_success() => Err(status_error()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ElementName;
    use serde_json::json;

    fn operation(style: BindingStyle, params: &[&str]) -> OperationDescriptor {
        OperationDescriptor {
            name: "genSSHA".to_string(),
            soap_action: None,
            soap_version: SoapVersion::Soap11,
            style,
            input_params: params.iter().map(|p| p.to_string()).collect(),
            input_element: None,
        }
    }

    #[test]
    fn test_default_body_orders_params_by_signature() {
        let request = CallRequest::new("genSSHA")
            .param("extra", 1)
            .param("hash_type", "sha512")
            .param("text", "hello & <world>");

        let body = default_body(
            "urn:genSSHA",
            &operation(BindingStyle::Rpc, &["text", "hash_type"]),
            &request,
        )
        .unwrap();

        assert_eq!(
            body,
            concat!(
                r#"<tns:genSSHA xmlns:tns="urn:genSSHA">"#,
                "<text>hello &amp; &lt;world&gt;</text>",
                "<hash_type>sha512</hash_type>",
                "<extra>1</extra>",
                "</tns:genSSHA>"
            )
        );
    }

    #[test]
    fn test_document_body_uses_default_namespace() {
        let request = CallRequest::new("genSSHA").param("text", "abc");
        let body = default_body(
            "urn:genSSHA",
            &operation(BindingStyle::Document, &["text"]),
            &request,
        )
        .unwrap();
        assert_eq!(
            body,
            r#"<genSSHA xmlns="urn:genSSHA"><text>abc</text></genSSHA>"#
        );
    }

    #[test]
    fn test_document_body_uses_input_element() {
        let mut operation = operation(BindingStyle::Document, &["UserID"]);
        operation.name = "GetUser".to_string();
        operation.input_element = Some(ElementName {
            name: "GetUserRequest".to_string(),
            namespace: Some("urn:ebay:apis:eBLBaseComponents".to_string()),
        });

        let request = CallRequest::new("GetUser").param("UserID", "bob");
        let body = default_body("urn:ebay:wsdl", &operation, &request).unwrap();

        assert_eq!(
            body,
            concat!(
                r#"<GetUserRequest xmlns="urn:ebay:apis:eBLBaseComponents">"#,
                "<UserID>bob</UserID>",
                "</GetUserRequest>"
            )
        );
    }

    #[test]
    fn test_invalid_element_names_are_rejected() {
        let request = CallRequest::new("genSSHA").param("a b><evil/", "x");
        assert!(matches!(
            default_body("urn:genSSHA", &operation(BindingStyle::Rpc, &[]), &request),
            Err(ProxyError::InvalidArgument { .. })
        ));

        let mut out = String::new();
        for name in ["", "1st", "ns:name", "a<b", "a b"] {
            assert!(write_value(&mut out, name, &json!("x")).is_err(), "{}", name);
        }
        assert!(write_value(&mut out, "item", &json!({"bad key": 1})).is_err());
        assert!(write_value(&mut out, "_sISBN-13.v2", &json!("x")).is_ok());
    }

    #[test]
    fn test_write_value_nested_and_repeated() {
        let mut out = String::new();
        write_value(
            &mut out,
            "item",
            &json!([{"id": 1, "tags": ["a", "b"]}, null, true]),
        )
        .unwrap();
        assert_eq!(
            out,
            "<item><id>1</id><tags>a</tags><tags>b</tags></item><item/><item>true</item>"
        );
    }

    #[test]
    fn test_envelope_uses_version_namespace() {
        let envelope = build_envelope(SoapVersion::Soap12, "<Ping/>");
        assert!(envelope.contains(r#"xmlns:soap="http://www.w3.org/2003/05/soap-envelope""#));
        assert!(envelope.contains("<soap:Body><Ping/></soap:Body>"));
    }

    #[test]
    fn test_decode_body() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
              <soap:Body>
                <m:IsValidISBN13Response xmlns:m="http://webservices.daehosting.com/ISBN">
                  <m:IsValidISBN13Result>true</m:IsValidISBN13Result>
                </m:IsValidISBN13Response>
              </soap:Body>
            </soap:Envelope>"#;

        let body = decode_body(xml).unwrap();
        assert_eq!(
            body,
            json!({"IsValidISBN13Response": {"IsValidISBN13Result": "true"}})
        );
    }

    #[test]
    fn test_decode_body_groups_repeated_elements() {
        let xml = r#"<Envelope><Body><List><v>1</v><v>2</v><v>3</v><e/></List></Body></Envelope>"#;
        assert_eq!(
            decode_body(xml).unwrap(),
            json!({"List": {"v": ["1", "2", "3"], "e": null}})
        );
    }

    #[test]
    fn test_mixed_content_keeps_text() {
        let xml = r#"<Envelope><Body><Note>see <b>this</b></Note></Body></Envelope>"#;
        assert_eq!(
            decode_body(xml).unwrap(),
            json!({"Note": {"b": "this", "$text": "see"}})
        );
    }

    #[test]
    fn test_missing_body_is_protocol_error() {
        assert!(matches!(
            decode_body("<Envelope><Header/></Envelope>"),
            Err(ProxyError::Protocol { .. })
        ));
    }

    #[test]
    fn test_soap11_fault_wins_over_status() {
        let response = TransportResponse {
            status: 500,
            body: r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault>
                <faultcode>s:Client</faultcode><faultstring>Bad ISBN</faultstring>
                </s:Fault></s:Body></s:Envelope>"#
                .to_string(),
        };
        match interpret_response(&response, "http://localhost/svc") {
            Err(ProxyError::SoapFault { code, message }) => {
                assert_eq!(code, "s:Client");
                assert_eq!(message, "Bad ISBN");
            }
            other => panic!("expected SoapFault, got {:?}", other),
        }
    }

    #[test]
    fn test_soap12_fault() {
        let body = json!({"Fault": {"Code": {"Value": "env:Sender"}, "Reason": {"Text": "nope"}}});
        match fault_from_body(&body) {
            Some(ProxyError::SoapFault { code, message }) => {
                assert_eq!(code, "env:Sender");
                assert_eq!(message, "nope");
            }
            other => panic!("expected SoapFault, got {:?}", other),
        }
    }

    #[test]
    fn test_status_error_without_fault() {
        let response = TransportResponse {
            status: 502,
            body: "<html>Bad gateway</html>".to_string(),
        };
        assert!(matches!(
            interpret_response(&response, "http://localhost/svc"),
            Err(ProxyError::HttpStatus { status: 502, .. })
        ));
    }
}
