//! Nearby point-of-interest search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{text_or, AmapClient, ParameterSpec, Tool};

const PLACE_AROUND_URL: &str = "https://restapi.amap.com/v5/place/around";

/// Search restaurants, services and venues around a coordinate.
pub struct SearchNearbyPoi {
    amap: AmapClient,
}

impl SearchNearbyPoi {
    pub fn new(amap: AmapClient) -> Self {
        Self { amap }
    }
}

#[derive(Debug, Deserialize)]
struct PlaceResponse {
    status: String,
    #[serde(default)]
    count: String,
    #[serde(default)]
    pois: Vec<Poi>,
}

/// Rating, cost and address arrive as `[]` when Amap has no data.
#[derive(Debug, Deserialize)]
struct Poi {
    #[serde(default)]
    name: String,
    #[serde(default)]
    rating: Value,
    #[serde(default)]
    cost: Value,
    #[serde(default)]
    distance: String,
    #[serde(default)]
    address: Value,
    #[serde(default)]
    business: Business,
}

#[derive(Debug, Default, Deserialize)]
struct Business {
    #[serde(default)]
    opentime_today: Value,
}

/// The summary shape the model reads back. The Chinese field names are
/// part of the conversational protocol, not decoration.
#[derive(Debug, Serialize)]
struct PoiSummary {
    #[serde(rename = "名称")]
    name: String,
    #[serde(rename = "评分")]
    rating: String,
    #[serde(rename = "费用")]
    cost: String,
    #[serde(rename = "距离")]
    distance: String,
    #[serde(rename = "地址")]
    address: String,
    #[serde(rename = "状态")]
    open_today: String,
}

fn format_pois(response: &PlaceResponse) -> anyhow::Result<String> {
    let count: u64 = response.count.parse().unwrap_or(0);
    if response.status != "1" || count == 0 {
        return Ok("在该范围内未找到匹配的结果。".to_string());
    }

    let summaries: Vec<PoiSummary> = response
        .pois
        .iter()
        .map(|poi| PoiSummary {
            name: poi.name.clone(),
            rating: text_or(&poi.rating, ""),
            cost: text_or(&poi.cost, ""),
            distance: format!("{}m", poi.distance),
            address: text_or(&poi.address, ""),
            open_today: text_or(&poi.business.opentime_today, "未知"),
        })
        .collect();
    Ok(serde_json::to_string(&summaries)?)
}

#[async_trait]
impl Tool for SearchNearbyPoi {
    fn name(&self) -> &str {
        "search_nearby_poi"
    }

    fn human_name(&self) -> &str {
        "周边搜索"
    }

    fn description(&self) -> &str {
        "用于在指定经纬度周边搜索餐厅、景点、生活服务等地点。支持按关键词和类别过滤、按距离或综合权重排序，返回每个地点的名称、评分、人均消费、距离、地址和当天营业时间。"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new(
                "location",
                "中心点坐标，格式为'经度,纬度'，例如：'116.473168,39.993015'。",
                true,
                json!({"type": "string"}),
            ),
            ParameterSpec::new(
                "keywords",
                "搜索关键词，例如：'火锅'、'咖啡'。留空则返回该类别下的全部结果。",
                false,
                json!({"type": "string"}),
            ),
            ParameterSpec::new(
                "types",
                "POI类别代码，默认'050000'（餐饮服务）。例如：'110000'为风景名胜。",
                false,
                json!({"type": "string"}),
            ),
            ParameterSpec::new(
                "sortrule",
                "排序规则：'distance'按距离，'weight'按综合权重。默认'distance'。",
                false,
                json!({"type": "string"}),
            ),
            ParameterSpec::new(
                "radius",
                "搜索半径，单位米，默认3000。",
                false,
                json!({"type": "integer"}),
            ),
            ParameterSpec::new(
                "region",
                "搜索区划，城市名或citycode，用于在坐标歧义时限定范围。",
                false,
                json!({"type": "string"}),
            ),
        ]
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let location = args["location"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'location' argument"))?;
        let keywords = args["keywords"].as_str().unwrap_or("");
        let types = args["types"].as_str().unwrap_or("050000");
        let sortrule = args["sortrule"].as_str().unwrap_or("distance");
        // accepted both as a number and as a string
        let radius = match &args["radius"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => "3000".to_string(),
        };

        let mut params = vec![
            ("location", location.to_string()),
            ("keywords", keywords.to_string()),
            ("types", types.to_string()),
            ("sortrule", sortrule.to_string()),
            ("radius", radius),
            ("show_fields", "cost,rating,business,tag".to_string()),
            ("page_size", "10".to_string()),
        ];
        if let Some(region) = args["region"].as_str() {
            params.push(("region", region.to_string()));
        }

        let response: PlaceResponse = self.amap.get(PLACE_AROUND_URL, &params).await?;
        format_pois(&response)
    }
}
