//! Fixed sample payload, useful for checking that a client can reach the
//! server and parse its JSON.

use serde::Serialize;

pub const PATH: &str = "/API/APISAMPLE";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Embedded {
    pub str: String,
    pub numb: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSampleData {
    pub int_data: i32,
    pub str_data: String,
    pub date_data: String,
    pub embedded: Embedded,
    pub str_array_data: Vec<String>,
}

/// Ignores its parameters and always answers the same document.
pub fn api_sample(_params: &str) -> Option<ApiSampleData> {
    Some(ApiSampleData {
        int_data: 576,
        str_data: "Sample String".to_string(),
        date_data: "2018-01-01T00:00:00".to_string(),
        embedded: Embedded {
            str: "Embeddded String".to_string(),
            numb: 123,
        },
        str_array_data: [
            "First member",
            "Second member",
            "Third Member",
            "Forth member",
            "Fifth member",
        ]
        .map(String::from)
        .to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn document() {
        let data = api_sample("ignored=1").unwrap();
        let value: Value = serde_json::to_value(&data).unwrap();

        assert_eq!(
            value,
            json!({
                "intData": 576,
                "strData": "Sample String",
                "dateData": "2018-01-01T00:00:00",
                "embedded": { "Str": "Embeddded String", "Numb": 123 },
                "strArrayData": [
                    "First member",
                    "Second member",
                    "Third Member",
                    "Forth member",
                    "Fifth member"
                ]
            })
        );
    }
}
