//! XML response decoding

use quick_xml::{events::Event, Reader};
use serde_json::{Map, Value};

/// Decode a SendGrid XML response into the same shape as its JSON
/// counterpart:
///
/// ```xml
/// <result>
///   <message>error</message>
///   <errors><error>Bad username / password</error></errors>
/// </result>
/// ```
///
/// becomes `{"message": "error", "errors": ["Bad username / password"]}`.
/// Other leaf elements below the root become string fields.
///
/// Returns [`None`] if the body is not well-formed or has no root element.
pub fn decode(xml: &str) -> Option<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = Map::new();
    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                seen_root = true;
                if path.len() == 1 && name == "errors" {
                    fields
                        .entry("errors")
                        .or_insert_with(|| Value::Array(Vec::new()));
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                seen_root = true;
                if path.len() == 1 && name == "errors" {
                    fields
                        .entry("errors")
                        .or_insert_with(|| Value::Array(Vec::new()));
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().ok()?.into_owned();
                insert_text(&mut fields, &path, text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                insert_text(&mut fields, &path, text);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    seen_root.then_some(Value::Object(fields))
}

fn insert_text(fields: &mut Map<String, Value>, path: &[String], text: String) {
    match path {
        [_root, errors, _error] if errors == "errors" => {
            if let Value::Array(list) = fields
                .entry("errors")
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                list.push(Value::String(text));
            }
        }
        [_root, name] => {
            fields.insert(name.clone(), Value::String(text));
        }
        _ => {}
    }
}
