//! Geocoding: human-readable addresses to coordinates.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AmapClient, ParameterSpec, Tool};

const GEOCODE_URL: &str = "https://restapi.amap.com/v3/geocode/geo";

/// Convert a detailed address or place name into `"lng,lat"` coordinates.
pub struct AddressToLocation {
    amap: AmapClient,
}

impl AddressToLocation {
    pub fn new(amap: AmapClient) -> Self {
        Self { amap }
    }
}

/// Amap reports `count` as a JSON string.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    count: String,
    #[serde(default)]
    geocodes: Vec<Geocode>,
}

#[derive(Debug, Deserialize)]
struct Geocode {
    #[serde(default)]
    location: String,
}

/// The first match's coordinates, or a retry hint when nothing matched.
fn format_geocodes(response: &GeocodeResponse) -> String {
    let count: u64 = response.count.parse().unwrap_or(0);
    if response.status == "1" && count > 0 {
        if let Some(first) = response.geocodes.first() {
            return first.location.clone();
        }
    }
    "未能解析该地址，请提供更详细的地址信息。".to_string()
}

#[async_trait]
impl Tool for AddressToLocation {
    fn name(&self) -> &str {
        "address_to_location"
    }

    fn human_name(&self) -> &str {
        "地理编码"
    }

    fn description(&self) -> &str {
        "将人类可读的详细地址或地名（如'北京市朝阳区望京SOHO'）转换为经纬度坐标（如'116.481,39.990'）。当用户提供了一个具体的地点名称，而你需要调用需要经纬度参数的工具（如周边搜索）时，必须先调用此工具进行转换。"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new(
            "address",
            "具体的地址信息，越详细解析越准确。例如：'成都市锦江区春熙路' 或 '上海东方明珠'。",
            true,
            json!({"type": "string"}),
        )]
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let address = args["address"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'address' argument"))?;

        let response: GeocodeResponse = self
            .amap
            .get(GEOCODE_URL, &[("address", address.to_string())])
            .await?;
        Ok(format_geocodes(&response))
    }
}
