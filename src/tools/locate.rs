//! IP-based city lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{text_or, AmapClient, ParameterSpec, Tool};

const IP_LOCATE_URL: &str = "https://restapi.amap.com/v3/ip";

/// Locate the user's city from the IP the request is made with.
pub struct GetCity {
    amap: AmapClient,
}

impl GetCity {
    pub fn new(amap: AmapClient) -> Self {
        Self { amap }
    }
}

/// Location fields stay as `Value`: Amap sends `[]` instead of a string
/// for anything it cannot resolve (LAN addresses in particular).
#[derive(Debug, Deserialize)]
struct IpLocateResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    province: Value,
    #[serde(default)]
    city: Value,
    #[serde(default)]
    adcode: Value,
    #[serde(default)]
    rectangle: Value,
}

#[derive(Debug, Serialize)]
struct CityInfo {
    province: String,
    city: String,
    adcode: String,
    location_rectangle: String,
}

#[derive(Debug, Serialize)]
struct LocateFailure {
    error: &'static str,
    reason: &'static str,
}

/// Render the lookup as the single-element list the model is told to
/// expect, or a structured failure it can relay to the user.
fn format_city(response: &IpLocateResponse) -> anyhow::Result<String> {
    if response.status != "1" {
        return Ok(format!("定位失败，原因：{}", response.info));
    }

    let province = text_or(&response.province, "");
    let city = text_or(&response.city, "");
    if province == "局域网" || city.is_empty() {
        let failure = [LocateFailure {
            error: "定位失败",
            reason: "局域网环境或无法识别IP",
        }];
        return Ok(serde_json::to_string(&failure)?);
    }

    let info = [CityInfo {
        province,
        city,
        adcode: text_or(&response.adcode, ""),
        location_rectangle: text_or(&response.rectangle, ""),
    }];
    Ok(serde_json::to_string(&info)?)
}

#[async_trait]
impl Tool for GetCity {
    fn name(&self) -> &str {
        "get_city"
    }

    fn human_name(&self) -> &str {
        "IP定位"
    }

    fn description(&self) -> &str {
        "通过用户IP自动获取位置。当你需要知道用户所在城市时调用此工具。该工具返回一个包含字典的列表，格式如下：[{'province': '省份', 'city': '城市名', 'adcode': '城市编码', 'location_rectangle': '范围坐标'}]。请从中提取 'city' 字段用于后续搜索。"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Takes no parameters; whatever is in the mapping is ignored.
    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        let response: IpLocateResponse = self.amap.get(IP_LOCATE_URL, &[]).await?;
        format_city(&response)
    }
}
