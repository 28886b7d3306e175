use serde_json::Value;

use crate::models::qr_record::QrType;

/// Turn a loose field map into the wire syntax a scanner app understands for
/// the given content kind. Url and text payloads pass through untouched.
pub fn format_content(qr_type: QrType, data: &Value) -> String {
    match qr_type {
        QrType::Vcard => format_vcard(data),
        QrType::Wifi => format_wifi(data),
        QrType::Email => format_email(data),
        QrType::Sms => format_sms(data),
        QrType::Geo => format_geo(data),
        QrType::Event => format_event(data),
        QrType::Phone => format!("tel:{}", field(data, "number")),
        QrType::Url | QrType::Text => field(data, "text").to_string(),
    }
}

fn field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("")
}

fn format_vcard(data: &Value) -> String {
    let first = field(data, "first_name");
    let last = field(data, "last_name");
    format!(
        "BEGIN:VCARD\nVERSION:3.0\nN:{last};{first}\nFN:{first} {last}\n\
         ORG:{org}\nTITLE:{title}\nTEL:{phone}\nEMAIL:{email}\nURL:{website}\n\
         ADR:;;{address};;;;\nEND:VCARD",
        org = field(data, "organization"),
        title = field(data, "title"),
        phone = field(data, "phone"),
        email = field(data, "email"),
        website = field(data, "website"),
        address = field(data, "address"),
    )
}

fn format_wifi(data: &Value) -> String {
    let encryption = data
        .get("encryption")
        .and_then(Value::as_str)
        .unwrap_or("WPA");
    let hidden = data
        .get("hidden")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    format!(
        "WIFI:T:{};S:{};P:{};H:{};;",
        encryption,
        field(data, "ssid"),
        field(data, "password"),
        if hidden { "true" } else { "" },
    )
}

fn format_email(data: &Value) -> String {
    format!(
        "mailto:{}?subject={}&body={}",
        field(data, "to"),
        field(data, "subject"),
        field(data, "body"),
    )
}

fn format_sms(data: &Value) -> String {
    format!("SMSTO:{}:{}", field(data, "number"), field(data, "message"))
}

fn format_geo(data: &Value) -> String {
    format!(
        "geo:{},{}",
        field(data, "latitude"),
        field(data, "longitude")
    )
}

fn format_event(data: &Value) -> String {
    format!(
        "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nSUMMARY:{}\nLOCATION:{}\n\
         DTSTART:{}\nDTEND:{}\nDESCRIPTION:{}\nEND:VEVENT\nEND:VCALENDAR",
        field(data, "summary"),
        field(data, "location"),
        field(data, "start"),
        field(data, "end"),
        field(data, "description"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wifi_syntax() {
        let data = json!({"ssid": "CafeNet", "password": "espresso", "encryption": "WPA"});
        assert_eq!(
            format_content(QrType::Wifi, &data),
            "WIFI:T:WPA;S:CafeNet;P:espresso;H:;;"
        );
    }

    #[test]
    fn hidden_wifi_sets_the_flag() {
        let data = json!({"ssid": "Lab", "password": "x", "hidden": true});
        assert!(format_content(QrType::Wifi, &data).contains("H:true;;"));
    }

    #[test]
    fn vcard_contains_name_lines() {
        let data = json!({"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"});
        let vcard = format_content(QrType::Vcard, &data);
        assert!(vcard.starts_with("BEGIN:VCARD"));
        assert!(vcard.contains("N:Lovelace;Ada"));
        assert!(vcard.contains("FN:Ada Lovelace"));
        assert!(vcard.contains("EMAIL:ada@example.com"));
        assert!(vcard.ends_with("END:VCARD"));
    }

    #[test]
    fn email_sms_geo_phone() {
        assert_eq!(
            format_content(QrType::Email, &json!({"to": "a@b.c", "subject": "Hi", "body": "Yo"})),
            "mailto:a@b.c?subject=Hi&body=Yo"
        );
        assert_eq!(
            format_content(QrType::Sms, &json!({"number": "+4912345", "message": "hello"})),
            "SMSTO:+4912345:hello"
        );
        assert_eq!(
            format_content(QrType::Geo, &json!({"latitude": "52.52", "longitude": "13.40"})),
            "geo:52.52,13.40"
        );
        assert_eq!(
            format_content(QrType::Phone, &json!({"number": "+4912345"})),
            "tel:+4912345"
        );
    }

    #[test]
    fn text_passes_through() {
        assert_eq!(
            format_content(QrType::Text, &json!({"text": "plain payload"})),
            "plain payload"
        );
    }
}
