//! City name to AMap adcode lookup

use std::collections::HashMap;
use std::path::Path;
use tracing::warn;
use crate::Result;

/// Shenzhen, used when a city cannot be resolved
pub const DEFAULT_ADCODE: &str = "440300";

const BUILTIN: &[(&str, &str)] = &[
    ("北京市", "110000"),
    ("东城区", "110101"),
    ("西城区", "110102"),
    ("朝阳区", "110105"),
    ("海淀区", "110108"),
    ("天津市", "120000"),
    ("石家庄市", "130100"),
    ("太原市", "140100"),
    ("呼和浩特市", "150100"),
    ("沈阳市", "210100"),
    ("大连市", "210200"),
    ("长春市", "220100"),
    ("哈尔滨市", "230100"),
    ("上海市", "310000"),
    ("南京市", "320100"),
    ("苏州市", "320500"),
    ("杭州市", "330100"),
    ("宁波市", "330200"),
    ("合肥市", "340100"),
    ("福州市", "350100"),
    ("厦门市", "350200"),
    ("南昌市", "360100"),
    ("济南市", "370100"),
    ("青岛市", "370200"),
    ("郑州市", "410100"),
    ("武汉市", "420100"),
    ("长沙市", "430100"),
    ("广州市", "440100"),
    ("深圳市", "440300"),
    ("珠海市", "440400"),
    ("东莞市", "441900"),
    ("南宁市", "450100"),
    ("海口市", "460100"),
    ("重庆市", "500000"),
    ("成都市", "510100"),
    ("贵阳市", "520100"),
    ("昆明市", "530100"),
    ("拉萨市", "540100"),
    ("西安市", "610100"),
    ("兰州市", "620100"),
    ("西宁市", "630100"),
    ("银川市", "640100"),
    ("乌鲁木齐市", "650100"),
    ("香港特别行政区", "810000"),
    ("澳门特别行政区", "820000"),
];

/// Name → adcode table
#[derive(Debug, Clone)]
pub struct CityCodes {
    codes: HashMap<String, String>,
}

impl CityCodes {
    /// Built-in table of provincial capitals and major cities
    pub fn builtin() -> Self {
        Self {
            codes: BUILTIN
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }

    /// Built-in table extended with a JSON object `{ "name": "adcode" }`.
    pub fn with_table(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extra: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        let mut table = Self::builtin();
        for (name, code) in extra {
            let code = match code {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    warn!("Ignoring adcode entry {} = {}", name, other);
                    continue;
                }
            };
            table.codes.insert(name, code);
        }
        Ok(table)
    }

    /// Resolve a city to its adcode.
    ///
    /// Accepts a literal six-digit adcode, an exact name, or a name without
    /// its 市 suffix. Unknown cities fall back to [`DEFAULT_ADCODE`].
    pub fn resolve(&self, city: &str) -> String {
        let city = city.trim();

        if city.len() == 6 && city.chars().all(|c| c.is_ascii_digit()) {
            return city.to_string();
        }

        if let Some(code) = self.codes.get(city) {
            return code.clone();
        }

        if let Some(code) = self.codes.get(&format!("{}市", city)) {
            return code.clone();
        }

        warn!("No adcode for city '{}', defaulting to Shenzhen", city);
        DEFAULT_ADCODE.to_string()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for CityCodes {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_names() {
        let codes = CityCodes::builtin();
        assert_eq!(codes.resolve("北京市"), "110000");
        assert_eq!(codes.resolve("东城区"), "110101");
        assert_eq!(codes.resolve("深圳"), "440300");
    }

    #[test]
    fn test_resolve_literal_adcode() {
        assert_eq!(CityCodes::builtin().resolve("310000"), "310000");
    }

    #[test]
    fn test_unknown_city_defaults_to_shenzhen() {
        assert_eq!(CityCodes::builtin().resolve("Atlantis"), DEFAULT_ADCODE);
    }

    #[test]
    fn test_with_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adcodes.json");
        std::fs::write(&path, r#"{"佛山市": "440600", "中山市": 442000}"#).unwrap();

        let codes = CityCodes::with_table(&path).unwrap();
        assert_eq!(codes.resolve("佛山"), "440600");
        assert_eq!(codes.resolve("中山市"), "442000");
        assert_eq!(codes.resolve("上海市"), "310000");
    }
}
