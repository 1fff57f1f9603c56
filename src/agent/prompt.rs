//! System prompt construction.
//!
//! Renders the Chinese ReAct instruction template the model is steered
//! with: current time, the tool catalogue, the 思考/行动/行动输入/观察
//! protocol and the opening-question guidance. The labels here and the
//! markers the parser looks for are two halves of one contract.

use crate::tools::ToolRegistry;

/// Build the system prompt from the registered tool descriptors.
///
/// Tools are listed in registration order, so the rendered prompt is
/// stable for a given registry.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let descriptors = tools.descriptors();
    let tool_info = descriptors
        .iter()
        .map(|d| format!("- {}: {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = descriptors
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    format!(
        r#"现在时间是 {now}。你是一位智能旅行助手，可以根据用户的要求定制化短途且详细周边游玩，可以推荐城市的游玩路线，范围等。 你可以使用以下工具来获取所需的信息：
{tool_info}

请遵循以下 ReAct 模式：

思考：分析问题和需要使用的工具
行动：选择工具 [{tool_names}] 中的一个
行动输入：提供工具的参数
观察：工具返回的结果

你可以重复以上循环，直到获得足够的信息来回答问题。

最终答案：基于所有信息给出最终答案

当开始的对话时，先获取用户的位置，询问用户的具体需求，例如：
- 您想游览哪个区域（如朝阳区、海淀区、东城区等）？
- 您偏好什么类型的活动（如历史文化、自然风光、美食购物、亲子娱乐等）？
- 您计划游玩多长时间（如半天、一天）？
- 您是否有特定的出发地点或交通方式？

开始！"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::AmapClient;

    #[test]
    fn prompt_lists_every_registered_tool() {
        let registry = ToolRegistry::with_amap(AmapClient::new("test-key"));
        let prompt = build_system_prompt(&registry);

        for name in [
            "address_to_location",
            "get_city",
            "get_sub_districts",
            "search_nearby_poi",
            "map_position",
        ] {
            assert!(prompt.contains(&format!("- {}: ", name)), "missing {}", name);
        }
        // the bracketed pick-list preserves registration order
        assert!(prompt.contains(
            "[address_to_location, get_city, get_sub_districts, search_nearby_poi, map_position]"
        ));
    }

    #[test]
    fn prompt_carries_the_protocol_markers() {
        let registry = ToolRegistry::with_amap(AmapClient::new("test-key"));
        let prompt = build_system_prompt(&registry);

        assert!(prompt.starts_with("现在时间是 "));
        for marker in ["思考：", "行动：", "行动输入：", "观察：", "最终答案："] {
            assert!(prompt.contains(marker), "missing {}", marker);
        }
        assert!(prompt.ends_with("开始！"));
    }
}
