//! XML-RPC codec, built on `quick-xml` rather than a dedicated xmlrpc crate
//! so request/response bodies can be represented as plain `serde_json::Value`
//! — the same type every other module in this crate already speaks, instead
//! of introducing a second value model at the protocol boundary.
//!
//! Supports the scalar types ERP field payloads actually use: `int`,
//! `double`, `boolean`, `string`, `array`, `struct`, and `nil`. `base64` and
//! `dateTime.iso8601` are not round-tripped — none of the modules in scope
//! exchange binary blobs or XML-RPC dates over this transport.

use crate::errors::SyncError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};
use std::io::Cursor;

pub fn encode_call(method: &str, params: &[Value]) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Start(BytesStart::new("methodCall")))
        .unwrap();

    write_text_element(&mut writer, "methodName", method);

    writer
        .write_event(Event::Start(BytesStart::new("params")))
        .unwrap();

    for param in params {
        writer
            .write_event(Event::Start(BytesStart::new("param")))
            .unwrap();
        write_value(&mut writer, param);
        writer
            .write_event(Event::End(BytesEnd::new("param")))
            .unwrap();
    }

    writer
        .write_event(Event::End(BytesEnd::new("params")))
        .unwrap();
    writer
        .write_event(Event::End(BytesEnd::new("methodCall")))
        .unwrap();

    writer.into_inner().into_inner()
}

pub fn decode_response(body: &[u8]) -> Result<Value, SyncError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_fault = false;
    let mut fault_value: Option<Value> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(format!("malformed XML-RPC response: {e}")))?
        {
            Event::Start(tag) if tag.name().as_ref() == b"fault" => in_fault = true,
            Event::Start(tag) if tag.name().as_ref() == b"value" => {
                let value = read_value(&mut reader)?;
                if in_fault {
                    fault_value = Some(value);
                } else {
                    return Ok(value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(fault) = fault_value {
        let code = fault
            .get("faultCode")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let message = fault
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or("<no message>");
        return Err(SyncError::ProtocolFault(format!("XML-RPC fault {code}: {message}")));
    }

    Err(SyncError::ProtocolFault(
        "XML-RPC response contained no value".to_string(),
    ))
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) {
    writer.write_event(Event::Start(BytesStart::new(tag))).unwrap();
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .unwrap();
    writer.write_event(Event::End(BytesEnd::new(tag))).unwrap();
}

fn write_value(writer: &mut Writer<Cursor<Vec<u8>>>, value: &Value) {
    writer
        .write_event(Event::Start(BytesStart::new("value")))
        .unwrap();

    match value {
        Value::Null => {
            writer
                .write_event(Event::Empty(BytesStart::new("nil")))
                .unwrap();
        }
        Value::Bool(b) => write_text_element(writer, "boolean", if *b { "1" } else { "0" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                write_text_element(writer, "int", &i.to_string());
            } else {
                write_text_element(writer, "double", &n.to_string());
            }
        }
        Value::String(s) => write_text_element(writer, "string", s),
        Value::Array(items) => {
            writer.write_event(Event::Start(BytesStart::new("array"))).unwrap();
            writer.write_event(Event::Start(BytesStart::new("data"))).unwrap();
            for item in items {
                write_value(writer, item);
            }
            writer.write_event(Event::End(BytesEnd::new("data"))).unwrap();
            writer.write_event(Event::End(BytesEnd::new("array"))).unwrap();
        }
        Value::Object(map) => {
            writer
                .write_event(Event::Start(BytesStart::new("struct")))
                .unwrap();
            for (key, val) in map {
                writer
                    .write_event(Event::Start(BytesStart::new("member")))
                    .unwrap();
                write_text_element(writer, "name", key);
                write_value(writer, val);
                writer
                    .write_event(Event::End(BytesEnd::new("member")))
                    .unwrap();
            }
            writer
                .write_event(Event::End(BytesEnd::new("struct")))
                .unwrap();
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("value")))
        .unwrap();
}

/// Reads one `<value>...</value>` body, assuming the opening `<value>` start
/// tag has already been consumed by the caller.
fn read_value(reader: &mut Reader<&[u8]>) -> Result<Value, SyncError> {
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(format!("malformed XML-RPC value: {e}")))?
        {
            Event::Start(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                let value = read_typed_value(reader, &name)?;
                skip_to_close(reader, "value")?;
                return Ok(value);
            }
            Event::Empty(tag) if tag.name().as_ref() == b"nil" => {
                skip_to_close(reader, "value")?;
                return Ok(Value::Null);
            }
            Event::Text(text) => {
                // Bare text inside <value> with no type tag is an implicit string.
                let s = text
                    .unescape()
                    .map_err(|e| SyncError::ProtocolFault(e.to_string()))?
                    .to_string();
                skip_to_close(reader, "value")?;
                return Ok(Value::String(s));
            }
            Event::End(tag) if tag.name().as_ref() == b"value" => return Ok(Value::String(String::new())),
            Event::Eof => {
                return Err(SyncError::ProtocolFault("unexpected EOF inside <value>".into()))
            }
            _ => {}
        }
        buf.clear();
    }
}

fn read_typed_value(reader: &mut Reader<&[u8]>, tag: &str) -> Result<Value, SyncError> {
    match tag {
        "int" | "i4" | "i8" => Ok(Value::Number(read_text(reader, tag)?.trim().parse::<i64>().unwrap_or(0).into())),
        "double" => {
            let text = read_text(reader, tag)?;
            let f: f64 = text.trim().parse().unwrap_or(0.0);
            Ok(serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        "boolean" => Ok(Value::Bool(read_text(reader, tag)?.trim() == "1")),
        "string" => Ok(Value::String(read_text(reader, tag)?)),
        "array" => read_array(reader),
        "struct" => read_struct(reader),
        other => {
            // Unknown/unsupported scalar tag (base64, dateTime.iso8601): read
            // and discard its text, surface as a plain string.
            Ok(Value::String(read_text(reader, other)?))
        }
    }
}

fn read_text(reader: &mut Reader<&[u8]>, closing_tag: &str) -> Result<String, SyncError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(e.to_string()))?
        {
            Event::Text(t) => {
                text.push_str(
                    &t.unescape()
                        .map_err(|e| SyncError::ProtocolFault(e.to_string()))?,
                );
            }
            Event::End(tag) if tag.name().as_ref() == closing_tag.as_bytes() => break,
            Event::Eof => return Err(SyncError::ProtocolFault("unexpected EOF".into())),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn read_array(reader: &mut Reader<&[u8]>) -> Result<Value, SyncError> {
    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(e.to_string()))?
        {
            Event::Start(tag) if tag.name().as_ref() == b"value" => {
                items.push(read_value(reader)?);
            }
            Event::End(tag) if tag.name().as_ref() == b"array" => break,
            Event::Eof => return Err(SyncError::ProtocolFault("unexpected EOF in <array>".into())),
            _ => {}
        }
        buf.clear();
    }

    Ok(Value::Array(items))
}

fn read_struct(reader: &mut Reader<&[u8]>) -> Result<Value, SyncError> {
    let mut buf = Vec::new();
    let mut map = Map::new();
    let mut pending_name: Option<String> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(e.to_string()))?
        {
            Event::Start(tag) if tag.name().as_ref() == b"name" => {
                pending_name = Some(read_text(reader, "name")?);
            }
            Event::Start(tag) if tag.name().as_ref() == b"value" => {
                let value = read_value(reader)?;
                if let Some(name) = pending_name.take() {
                    map.insert(name, value);
                }
            }
            Event::End(tag) if tag.name().as_ref() == b"struct" => break,
            Event::Eof => return Err(SyncError::ProtocolFault("unexpected EOF in <struct>".into())),
            _ => {}
        }
        buf.clear();
    }

    Ok(Value::Object(map))
}

fn skip_to_close(reader: &mut Reader<&[u8]>, closing_tag: &str) -> Result<(), SyncError> {
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::ProtocolFault(e.to_string()))?
        {
            Event::End(tag) if tag.name().as_ref() == closing_tag.as_bytes() => return Ok(()),
            Event::Eof => return Err(SyncError::ProtocolFault("unexpected EOF".into())),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_method_call_with_struct_param() {
        let body = encode_call("execute_kw", &[json!({"id": 1, "name": "Acme"})]);
        let text = String::from_utf8(body).unwrap();

        assert!(text.contains("<methodName>execute_kw</methodName>"));
        assert!(text.contains("<struct>"));
        assert!(text.contains("<member>"));
    }

    #[test]
    fn decodes_successful_response() {
        let body = br#"<?xml version="1.0"?>
<methodResponse>
  <params>
    <param>
      <value><struct>
        <member><name>id</name><value><int>42</int></value></member>
        <member><name>name</name><value><string>Acme</string></value></member>
      </struct></value>
    </param>
  </params>
</methodResponse>"#;

        let value = decode_response(body).unwrap();
        assert_eq!(value["id"], 42);
        assert_eq!(value["name"], "Acme");
    }

    #[test]
    fn decodes_fault_as_protocol_fault() {
        let body = br#"<?xml version="1.0"?>
<methodResponse>
  <fault>
    <value><struct>
      <member><name>faultCode</name><value><int>1</int></value></member>
      <member><name>faultString</name><value><string>Access Denied</string></value></member>
    </struct></value>
  </fault>
</methodResponse>"#;

        let err = decode_response(body).unwrap_err();
        assert!(matches!(err, SyncError::ProtocolFault(_)));
    }
}
