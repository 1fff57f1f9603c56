//! Static-map URL construction.
//!
//! Pure string assembly, no request is made. The Amap static-map API
//! accepts raw UTF-8 in its query string, and its markers/labels
//! micro-format uses `,` `:` `|` and `;` as structural delimiters, so
//! nothing here is urlencoded. Encoding those characters breaks the
//! rendering.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{AmapClient, ParameterSpec, Tool};

const STATIC_MAP_URL: &str = "https://restapi.amap.com/v3/staticmap";

/// Render an itinerary as a static-map URL with lettered markers, name
/// labels and a path connecting the stops in order.
pub struct MapPosition {
    amap: AmapClient,
}

impl MapPosition {
    pub fn new(amap: AmapClient) -> Self {
        Self { amap }
    }
}

/// Trimmed string items of a JSON array; non-string items are skipped.
fn string_items(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Strip the characters that collide with the label micro-format and cap
/// the length at the six characters a label bubble can hold.
fn sanitize_label(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '|' | ':' | ','))
        .take(6)
        .collect()
}

/// Marker bubbles run A through Z; anything past the 26th stop reuses Z.
fn marker_letter(index: usize) -> char {
    if index < 26 {
        (b'A' + index as u8) as char
    } else {
        'Z'
    }
}

fn build_map_url(
    api_key: &str,
    locations: &[String],
    names: &[String],
    zoom: Option<String>,
    size: &str,
) -> String {
    let markers = locations
        .iter()
        .enumerate()
        .map(|(i, loc)| format!("mid,0xFF0000,{}:{}", marker_letter(i), loc))
        .collect::<Vec<_>>()
        .join("|");

    // label micro-format: 内容,字体,粗体,字号,字色,背景色:经纬度
    let labels = names
        .iter()
        .zip(locations.iter())
        .map(|(name, loc)| format!("{},0,1,14,0xFFFFFF,0x5288d8:{}", sanitize_label(name), loc))
        .collect::<Vec<_>>()
        .join("|");

    let mut query = vec![
        format!("key={}", api_key),
        format!("size={}", size),
        format!("markers={}", markers),
        format!("labels={}", labels),
        "scale=2".to_string(),
    ];

    if locations.len() >= 2 {
        query.push(format!("paths=5,0x0000FF,0.8,,:{}", locations.join(";")));
    }
    if let Some(zoom) = zoom {
        query.push(format!("zoom={}", zoom));
    }

    format!("{}?{}", STATIC_MAP_URL, query.join("&"))
}

#[async_trait]
impl Tool for MapPosition {
    fn name(&self) -> &str {
        "map_position"
    }

    fn human_name(&self) -> &str {
        "静态地图"
    }

    fn description(&self) -> &str {
        "该工具用于生成包含图标(markers)、文字名称标注(labels)和行程路径线(paths)的高级静态地图图片URL。适用于：推荐'一日游'线路、展示'美食探店'分布、或为用户规划多个地点间的行走路线。地图会自动在每个地点标出 A, B, C 气泡，并在旁边显示具体的地点名称，最后按顺序用蓝色线条连接各点。"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new(
                "locations",
                "按游玩顺序排列的坐标列表，每项格式为'经度,纬度'。",
                true,
                json!({"type": "array", "items": {"type": "string"}}),
            ),
            ParameterSpec::new(
                "names",
                "与坐标一一对应的地点名称列表，用于在地图上标注。",
                true,
                json!({"type": "array", "items": {"type": "string"}}),
            ),
            ParameterSpec::new(
                "zoom",
                "地图缩放级别(1-17)。不提供时由 API 根据标注自动取景。",
                false,
                json!({"type": "integer"}),
            ),
            ParameterSpec::new(
                "size",
                "图片尺寸，格式'宽*高'，默认'700*400'。",
                false,
                json!({"type": "string"}),
            ),
        ]
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        if !args["locations"].is_array() {
            anyhow::bail!("Missing 'locations' argument");
        }
        let locations = string_items(&args["locations"]);
        if locations.is_empty() {
            return Ok("错误：请提供至少一个坐标点".to_string());
        }

        if !args["names"].is_array() {
            anyhow::bail!("Missing 'names' argument");
        }
        let names = string_items(&args["names"]);

        let size = args["size"].as_str().unwrap_or("700*400").to_string();
        let zoom = match &args["zoom"] {
            Value::Number(n) => Some(n.to_string()).filter(|z| z != "0"),
            Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
            _ => None,
        };

        Ok(build_map_url(
            self.amap.api_key(),
            &locations,
            &names,
            zoom,
            &size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> MapPosition {
        MapPosition::new(AmapClient::new("test-key"))
    }

    #[tokio::test]
    async fn itinerary_renders_markers_labels_and_path() {
        let url = tool()
            .execute(json!({
                "locations": ["116.397,39.909", "116.403,39.924", "116.413,39.947"],
                "names": ["天安门", "景山公园", "南锣鼓巷"]
            }))
            .await
            .unwrap();

        assert!(url.starts_with("https://restapi.amap.com/v3/staticmap?key=test-key&size=700*400&"));
        assert!(url.contains("markers=mid,0xFF0000,A:116.397,39.909|mid,0xFF0000,B:116.403,39.924|mid,0xFF0000,C:116.413,39.947"));
        assert!(url.contains("labels=天安门,0,1,14,0xFFFFFF,0x5288d8:116.397,39.909|"));
        assert!(url.contains("&scale=2"));
        assert!(url.contains("paths=5,0x0000FF,0.8,,:116.397,39.909;116.403,39.924;116.413,39.947"));
        // raw delimiters survive: nothing may be urlencoded
        assert!(!url.contains("%2C"));
        assert!(!url.contains("%7C"));
    }

    #[tokio::test]
    async fn single_stop_gets_no_path() {
        let url = tool()
            .execute(json!({
                "locations": ["116.397,39.909"],
                "names": ["天安门"]
            }))
            .await
            .unwrap();

        assert!(url.contains("markers=mid,0xFF0000,A:116.397,39.909"));
        assert!(!url.contains("paths="));
    }

    #[tokio::test]
    async fn zoom_is_appended_only_when_meaningful() {
        let with_zoom = tool()
            .execute(json!({
                "locations": ["116.397,39.909"],
                "names": ["天安门"],
                "zoom": 13
            }))
            .await
            .unwrap();
        assert!(with_zoom.ends_with("&zoom=13"));

        let zero_zoom = tool()
            .execute(json!({
                "locations": ["116.397,39.909"],
                "names": ["天安门"],
                "zoom": 0
            }))
            .await
            .unwrap();
        assert!(!zero_zoom.contains("zoom="));
    }

    #[tokio::test]
    async fn empty_location_list_is_an_observation_not_an_error() {
        let result = tool()
            .execute(json!({"locations": [], "names": []}))
            .await
            .unwrap();
        assert_eq!(result, "错误：请提供至少一个坐标点");
    }

    #[tokio::test]
    async fn missing_locations_key_is_an_error() {
        let err = tool().execute(json!({"names": ["天安门"]})).await.unwrap_err();
        assert!(err.to_string().contains("locations"));
    }

    #[test]
    fn labels_are_sanitized_and_capped() {
        assert_eq!(sanitize_label("起点:望京SOHO塔"), "起点望京SO");
        assert_eq!(sanitize_label("天安门"), "天安门");
        assert_eq!(sanitize_label("a|b:c,d"), "abcd");
    }

    #[test]
    fn marker_letters_saturate_at_z() {
        assert_eq!(marker_letter(0), 'A');
        assert_eq!(marker_letter(25), 'Z');
        assert_eq!(marker_letter(30), 'Z');
    }
}
