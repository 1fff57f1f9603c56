//! Administrative district lookup.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AmapClient, ParameterSpec, Tool};

const DISTRICT_URL: &str = "https://restapi.amap.com/v3/config/district";

/// List the direct sub-districts of a province, city or district.
pub struct GetSubDistricts {
    amap: AmapClient,
}

impl GetSubDistricts {
    pub fn new(amap: AmapClient) -> Self {
        Self { amap }
    }
}

#[derive(Debug, Deserialize)]
struct DistrictResponse {
    status: String,
    #[serde(default)]
    districts: Vec<District>,
}

#[derive(Debug, Deserialize)]
struct District {
    #[serde(default)]
    name: String,
    #[serde(default)]
    districts: Vec<District>,
}

/// Names of the best match's direct children. Unmatched keywords and
/// provider errors both come back as an empty list.
fn sub_district_names(response: &DistrictResponse) -> Vec<String> {
    if response.status != "1" {
        return Vec::new();
    }
    response
        .districts
        .first()
        .map(|region| region.districts.iter().map(|sub| sub.name.clone()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl Tool for GetSubDistricts {
    fn name(&self) -> &str {
        "get_sub_districts"
    }

    fn human_name(&self) -> &str {
        "行政区划查询"
    }

    fn description(&self) -> &str {
        "用于查询中国某个行政区域（省、市、区）下属的次级行政区列表。当你需要引导用户精确选择位置，或者需要确认某个城市下有哪些区县时使用。输入一个关键词（如'四川省'或'成都市'），该工具将返回其直接下属的行政区名称列表。"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new(
            "keywords",
            "需要查询的行政区名称，例如：'浙江省'、'杭州市' 或 '西湖区'。",
            true,
            json!({"type": "string"}),
        )]
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let keywords = args["keywords"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'keywords' argument"))?;

        let response: DistrictResponse = self
            .amap
            .get(
                DISTRICT_URL,
                &[
                    ("keywords", keywords.to_string()),
                    ("subdistrict", "1".to_string()),
                    ("extensions", "base".to_string()),
                ],
            )
            .await?;
        Ok(serde_json::to_string(&sub_district_names(&response))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_children_of_the_first_match_are_listed() {
        let response: DistrictResponse = serde_json::from_str(
            r#"{"status":"1","info":"OK","districts":[
                {"adcode":"510100","name":"成都市","level":"city","districts":[
                    {"adcode":"510104","name":"锦江区","level":"district","districts":[]},
                    {"adcode":"510105","name":"青羊区","level":"district","districts":[]},
                    {"adcode":"510107","name":"武侯区","level":"district","districts":[]}
                ]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            sub_district_names(&response),
            ["锦江区", "青羊区", "武侯区"]
        );
    }

    #[test]
    fn unmatched_keyword_yields_an_empty_list() {
        let response: DistrictResponse =
            serde_json::from_str(r#"{"status":"1","info":"OK","districts":[]}"#).unwrap();
        assert!(sub_district_names(&response).is_empty());
    }

    #[test]
    fn provider_rejection_yields_an_empty_list() {
        let response: DistrictResponse =
            serde_json::from_str(r#"{"status":"0","info":"INVALID_PARAMS"}"#).unwrap();
        assert!(sub_district_names(&response).is_empty());
    }

    #[test]
    fn leaf_region_without_children_yields_an_empty_list() {
        let response: DistrictResponse = serde_json::from_str(
            r#"{"status":"1","info":"OK","districts":[
                {"adcode":"510104","name":"锦江区","level":"district","districts":[]}
            ]}"#,
        )
        .unwrap();
        assert!(sub_district_names(&response).is_empty());
    }
}
