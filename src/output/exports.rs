use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Writes any serializable result as a single JSON document.
pub fn export_json<T>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BuildRecord, BuildStatus, Revision};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn create_test_record() -> BuildRecord {
        let mut image = BTreeMap::new();
        image.insert("digest".to_string(), "sha256:1".to_string());

        BuildRecord {
            id: "103".to_string(),
            number: 12,
            status: BuildStatus::Succeeded,
            building: false,
            name: "test".to_string(),
            display_name: "main/app/test".to_string(),
            url: "https://ci.example.com/teams/main/pipelines/app/jobs/test/builds/12".to_string(),
            revisions: vec![Revision {
                sha: Some("abc".to_string()),
                timestamp: Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()),
                ..Revision::default()
            }],
            properties: Some(BTreeMap::from([("app-image".to_string(), image)])),
        }
    }

    #[test]
    fn test_export_json() {
        let record = create_test_record();
        let mut output = Vec::new();
        export_json(&record, false, &mut output).unwrap();
        let json_str = String::from_utf8(output).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["display_name"], "main/app/test");
        assert_eq!(value["revisions"][0]["sha"], "abc");
        assert_eq!(value["revisions"][0]["timestamp"], "2020-01-02T03:04:05Z");
        assert_eq!(value["properties"]["app-image"]["digest"], "sha256:1");
    }

    #[test]
    fn test_export_json_pretty() {
        let record = create_test_record();
        let mut output = Vec::new();
        export_json(&record, true, &mut output).unwrap();
        let json_str = String::from_utf8(output).unwrap();
        assert!(json_str.contains('\n'));
        assert!(json_str.contains("  "));
    }

    #[test]
    fn test_export_json_omits_missing_properties() {
        let record = BuildRecord {
            properties: None,
            ..create_test_record()
        };
        let mut output = Vec::new();
        export_json(&record, false, &mut output).unwrap();
        let json_str = String::from_utf8(output).unwrap();
        assert!(!json_str.contains("properties"));
    }

    #[test]
    fn test_export_json_slice() {
        let records = vec![create_test_record(), create_test_record()];
        let mut output = Vec::new();
        export_json(records.as_slice(), false, &mut output).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&output).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
