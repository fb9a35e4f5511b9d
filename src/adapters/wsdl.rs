//! WSDL 1.1 reader.
//!
//! Only the pieces needed to dispatch calls are collected: operation names,
//! their SOAP actions and binding version, the ordered input parameter names,
//! the input element of document-style operations and the service address.
//! Operations come only from port types referenced by a SOAP binding, so the
//! `HttpGet`/`HttpPost` port types of `.asmx` services are skipped. Schema
//! types beyond one level of `sequence` are not interpreted.

use crate::adapters::xml::{attr, local_name, local_part, namespace_of};
use crate::domain::model::{
    BindingStyle, ElementName, OperationDescriptor, ServiceDescriptor, SoapVersion,
};
use crate::utils::error::{ProxyError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::NsReader;
use std::collections::{BTreeMap, HashMap};
use url::Url;

const SOAP11_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
const SOAP12_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

#[derive(Debug, Default)]
struct Part {
    name: String,
    element: Option<String>,
    /// `element` 前綴解析出的命名空間
    element_namespace: Option<String>,
}

#[derive(Debug, Default)]
struct PortOperation {
    name: String,
    port_type: Option<String>,
    input_message: Option<String>,
}

#[derive(Debug, Default)]
struct BindingOperation {
    name: String,
    soap_action: Option<String>,
    style: Option<BindingStyle>,
}

#[derive(Debug, Default)]
struct Binding {
    port_type: Option<String>,
    version: Option<SoapVersion>,
    style: Option<BindingStyle>,
    operations: Vec<BindingOperation>,
}

#[derive(Debug, Default)]
struct WsdlDocument {
    root_seen: bool,
    name: Option<String>,
    target_namespace: Option<String>,
    service_name: Option<String>,
    messages: HashMap<String, Vec<Part>>,
    last_message: Option<String>,
    current_port_type: Option<String>,
    port_operations: Vec<PortOperation>,
    bindings: Vec<Binding>,
    /// (location, 是否為 SOAP 1.1 address)
    addresses: Vec<(String, bool)>,
    current_schema_namespace: Option<String>,
    schema_elements: HashMap<String, SchemaElement>,
    last_schema_element: Option<String>,
}

#[derive(Debug, Default)]
struct SchemaElement {
    namespace: Option<String>,
    children: Vec<String>,
}

impl Binding {
    fn binds(&self, operation: &PortOperation) -> bool {
        match &self.port_type {
            Some(port_type) => operation.port_type.as_ref() == Some(port_type),
            None => true,
        }
    }
}

/// 解析 WSDL 文件；`source` 只用於錯誤訊息
pub fn parse_wsdl(source: &str, xml: &str) -> Result<ServiceDescriptor> {
    let document = read_document(xml).map_err(|e| match e {
        ProxyError::Xml(err) => ProxyError::wsdl(source, format!("malformed XML: {}", err)),
        ProxyError::Protocol { message } => ProxyError::wsdl(source, message),
        other => other,
    })?;

    document
        .into_descriptor()
        .map_err(|message| ProxyError::wsdl(source, message))
}

fn read_document(xml: &str) -> Result<WsdlDocument> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = WsdlDocument::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = namespace_of(&resolved);
        match event {
            Event::Start(element) => {
                let local = local_name(&element);
                document.open(&reader, &stack, namespace.as_deref(), &local, &element)?;
                stack.push(local);
            }
            Event::Empty(element) => {
                let local = local_name(&element);
                document.open(&reader, &stack, namespace.as_deref(), &local, &element)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !document.root_seen {
        return Err(ProxyError::protocol("document has no root element"));
    }
    Ok(document)
}

impl WsdlDocument {
    fn open(
        &mut self,
        reader: &NsReader<&[u8]>,
        stack: &[String],
        namespace: Option<&str>,
        local: &str,
        element: &BytesStart<'_>,
    ) -> Result<()> {
        if !self.root_seen {
            if local != "definitions" {
                return Err(ProxyError::protocol(format!(
                    "root element <{}> is not wsdl:definitions",
                    local
                )));
            }
            self.root_seen = true;
            self.name = attr(element, "name")?;
            self.target_namespace = attr(element, "targetNamespace")?;
            return Ok(());
        }

        let parent = stack.last().map(String::as_str);
        let grandparent = stack
            .len()
            .checked_sub(2)
            .map(|index| stack[index].as_str());

        match (parent, local) {
            (Some("definitions"), "message") => {
                if let Some(name) = attr(element, "name")? {
                    self.last_message = Some(name.clone());
                    self.messages.insert(name, Vec::new());
                }
            }
            (Some("message"), "part") => {
                if let (Some(message), Some(name)) =
                    (self.last_message.clone(), attr(element, "name")?)
                {
                    let element = attr(element, "element")?;
                    let element_namespace = element
                        .as_deref()
                        .and_then(|qname| resolve_qname(reader, qname));
                    let part = Part {
                        name,
                        element,
                        element_namespace,
                    };
                    self.messages.entry(message).or_default().push(part);
                }
            }
            (Some("definitions"), "portType") => {
                self.current_port_type = attr(element, "name")?;
            }
            (Some("portType"), "operation") => {
                self.port_operations.push(PortOperation {
                    name: attr(element, "name")?.unwrap_or_default(),
                    port_type: self.current_port_type.clone(),
                    input_message: None,
                });
            }
            (Some("operation"), "input") if grandparent == Some("portType") => {
                if let Some(operation) = self.port_operations.last_mut() {
                    operation.input_message =
                        attr(element, "message")?.map(|m| local_part(&m).to_string());
                }
            }
            (Some("definitions"), "binding") => self.bindings.push(Binding {
                port_type: attr(element, "type")?.map(|t| local_part(&t).to_string()),
                ..Default::default()
            }),
            (Some("binding"), "binding") => {
                if let Some(binding) = self.bindings.last_mut() {
                    binding.version = soap_version_of(namespace);
                    binding.style = parse_style(attr(element, "style")?);
                }
            }
            (Some("binding"), "operation") => {
                if let Some(binding) = self.bindings.last_mut() {
                    binding.operations.push(BindingOperation {
                        name: attr(element, "name")?.unwrap_or_default(),
                        ..Default::default()
                    });
                }
            }
            (Some("operation"), "operation") if grandparent == Some("binding") => {
                let soap_action = attr(element, "soapAction")?;
                let style = parse_style(attr(element, "style")?);
                if let Some(operation) = self
                    .bindings
                    .last_mut()
                    .and_then(|binding| binding.operations.last_mut())
                {
                    operation.soap_action = soap_action;
                    operation.style = style;
                }
            }
            (Some("definitions"), "service") => {
                self.service_name = attr(element, "name")?;
            }
            (Some("port"), "address") if grandparent == Some("service") => {
                if let Some(location) = attr(element, "location")? {
                    let is_soap11 = soap_version_of(namespace) == Some(SoapVersion::Soap11);
                    self.addresses.push((location, is_soap11));
                }
            }
            (_, "schema") => {
                self.current_schema_namespace = attr(element, "targetNamespace")?;
            }
            (_, "element") => self.collect_schema_element(stack, element)?,
            _ => {}
        }

        Ok(())
    }

    fn collect_schema_element(
        &mut self,
        stack: &[String],
        element: &BytesStart<'_>,
    ) -> Result<()> {
        let Some(schema_index) = stack.iter().rposition(|name| name == "schema") else {
            return Ok(());
        };
        let below_schema: Vec<&str> = stack[schema_index + 1..]
            .iter()
            .map(String::as_str)
            .collect();

        match below_schema.as_slice() {
            [] => {
                if let Some(name) = attr(element, "name")? {
                    self.last_schema_element = Some(name.clone());
                    self.schema_elements.insert(
                        name,
                        SchemaElement {
                            namespace: self.current_schema_namespace.clone(),
                            children: Vec::new(),
                        },
                    );
                }
            }
            ["element", "complexType", "sequence" | "all"] => {
                let child = match attr(element, "name")? {
                    Some(name) => Some(name),
                    None => attr(element, "ref")?.map(|r| local_part(&r).to_string()),
                };
                if let (Some(parent), Some(child)) = (self.last_schema_element.clone(), child) {
                    self.schema_elements
                        .entry(parent)
                        .or_default()
                        .children
                        .push(child);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn into_descriptor(self) -> std::result::Result<ServiceDescriptor, String> {
        // SOAP 1.1 綁定優先，同名操作只取第一個綁定
        let mut bindings: Vec<(&Binding, SoapVersion)> = self
            .bindings
            .iter()
            .filter_map(|binding| binding.version.map(|version| (binding, version)))
            .collect();
        bindings.sort_by_key(|(_, version)| *version != SoapVersion::Soap11);

        let mut operations = BTreeMap::new();
        for (binding, version) in bindings {
            for port_operation in self.port_operations.iter().filter(|op| binding.binds(op)) {
                if port_operation.name.is_empty() || operations.contains_key(&port_operation.name) {
                    continue;
                }

                let binding_operation = binding
                    .operations
                    .iter()
                    .find(|op| op.name == port_operation.name);
                let style = binding_operation
                    .and_then(|op| op.style)
                    .or(binding.style)
                    .unwrap_or(BindingStyle::Document);
                let (input_params, input_element) = self.input_signature(port_operation, style);

                let descriptor = OperationDescriptor {
                    name: port_operation.name.clone(),
                    soap_action: binding_operation.and_then(|op| op.soap_action.clone()),
                    soap_version: version,
                    style,
                    input_params,
                    input_element,
                };
                operations.insert(descriptor.name.clone(), descriptor);
            }
        }

        if operations.is_empty() {
            return Err("document declares no operations".to_string());
        }

        let location = self
            .addresses
            .iter()
            .find(|(_, is_soap11)| *is_soap11)
            .or_else(|| self.addresses.first())
            .and_then(|(location, _)| Url::parse(location).ok());

        Ok(ServiceDescriptor {
            service_name: self.service_name.or(self.name),
            target_namespace: self.target_namespace.unwrap_or_default(),
            location,
            operations,
        })
    }

    /// 輸入參數名稱，以及 document 風格下作為 Body 外層的 element
    fn input_signature(
        &self,
        operation: &PortOperation,
        style: BindingStyle,
    ) -> (Vec<String>, Option<ElementName>) {
        let Some(parts) = operation
            .input_message
            .as_ref()
            .and_then(|message| self.messages.get(message))
        else {
            return (Vec::new(), None);
        };

        match (style, parts.as_slice()) {
            // document/literal：參數來自 part element 的 sequence
            (BindingStyle::Document, [part]) if part.element.is_some() => {
                let name = part.element.as_deref().map(local_part).unwrap_or_default();
                let schema_element = self.schema_elements.get(name);
                let namespace = part
                    .element_namespace
                    .clone()
                    .or_else(|| schema_element.and_then(|e| e.namespace.clone()));
                let params = schema_element
                    .map(|e| e.children.clone())
                    .unwrap_or_default();
                let element = ElementName {
                    name: name.to_string(),
                    namespace,
                };
                (params, Some(element))
            }
            _ => (parts.iter().map(|part| part.name.clone()).collect(), None),
        }
    }
}

fn resolve_qname(reader: &NsReader<&[u8]>, qname: &str) -> Option<String> {
    let (resolved, _) = reader.resolve_element(QName(qname.as_bytes()));
    namespace_of(&resolved)
}

fn soap_version_of(namespace: Option<&str>) -> Option<SoapVersion> {
    match namespace {
        Some(SOAP11_BINDING_NS) => Some(SoapVersion::Soap11),
        Some(SOAP12_BINDING_NS) => Some(SoapVersion::Soap12),
        _ => None,
    }
}

fn parse_style(style: Option<String>) -> Option<BindingStyle> {
    match style.as_deref() {
        Some("rpc") => Some(BindingStyle::Rpc),
        Some("document") => Some(BindingStyle::Document),
        _ => None,
    }
}
