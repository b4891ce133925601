//! Minimal XML property list rendering for entitlement files

use serde_json::Value;
use std::collections::BTreeMap;

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Render a top-level dictionary as an XML plist document
pub fn render_plist(dict: &BTreeMap<String, Value>) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n",
    );
    out.push_str("<dict>\n");
    for (key, value) in dict {
        write_entry(&mut out, key, value, 1);
    }
    out.push_str("</dict>\n</plist>\n");
    out
}

fn indent(level: usize) -> String {
    "\t".repeat(level)
}

fn write_entry(out: &mut String, key: &str, value: &Value, level: usize) {
    out.push_str(&format!("{}<key>{}</key>\n", indent(level), xml_escape(key)));
    write_value(out, value, level);
}

fn write_value(out: &mut String, value: &Value, level: usize) {
    let pad = indent(level);
    match value {
        Value::Null => out.push_str(&format!("{}<string></string>\n", pad)),
        Value::Bool(true) => out.push_str(&format!("{}<true/>\n", pad)),
        Value::Bool(false) => out.push_str(&format!("{}<false/>\n", pad)),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            out.push_str(&format!("{}<integer>{}</integer>\n", pad, n))
        }
        Value::Number(n) => out.push_str(&format!("{}<real>{}</real>\n", pad, n)),
        Value::String(s) => out.push_str(&format!("{}<string>{}</string>\n", pad, xml_escape(s))),
        Value::Array(items) if items.is_empty() => out.push_str(&format!("{}<array/>\n", pad)),
        Value::Array(items) => {
            out.push_str(&format!("{}<array>\n", pad));
            for item in items {
                write_value(out, item, level + 1);
            }
            out.push_str(&format!("{}</array>\n", pad));
        }
        Value::Object(map) if map.is_empty() => out.push_str(&format!("{}<dict/>\n", pad)),
        Value::Object(map) => {
            out.push_str(&format!("{}<dict>\n", pad));
            // serde_json maps are ordered by key without preserve_order
            for (k, v) in map {
                write_entry(out, k, v, level + 1);
            }
            out.push_str(&format!("{}</dict>\n", pad));
        }
    }
}
