//! The extraction prompt and the demo-mode reply.
//!
//! Both live here so a prompt change is a one-file diff and tests can
//! inspect the exact text the model receives. Callers can swap the prompt
//! via [`crate::config::RecognitionConfig::prompt`].

/// Instruction sent alongside the order photo.
///
/// Names the five target fields verbatim; the normalizer and the exported
/// header row use whatever keys the model echoes back, so these names are
/// what end up as column titles.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"你是一个工厂订单处理专家。请分析这张图片（可能是手写清单、白板照片或打印件）。
请提取所有的：产品名称、规格/型号、数量、单位、颜色/备注。

请严格按照以下JSON格式返回数据，不要包含Markdown标记或其他文字：
[
    {"产品名称": "示例螺丝", "规格": "M4x10", "数量": 1000, "单位": "个", "备注": "不锈钢"},
    ...
]
如果某个字段无法识别，请留空字符串。如果是无关内容请忽略。"#;

/// Model reply used in demo mode in place of a network call.
///
/// Wrapped in an `items` object, the shape JSON mode most often produces,
/// so demo runs exercise the keyed-sequence path of the normalizer.
pub const DEMO_RESPONSE: &str = r#"{"items": [
    {"产品名称": "六角螺栓", "规格": "M12x50", "数量": 500, "单位": "个", "备注": "镀锌"},
    {"产品名称": "平垫圈", "规格": "M12", "数量": 500, "单位": "个", "备注": ""},
    {"产品名称": "不锈钢自攻螺丝", "规格": "ST4.2x16", "数量": 2000, "单位": "个", "备注": "304"},
    {"产品名称": "角码", "规格": "40x40x3", "数量": 120, "单位": "件", "备注": "黑色喷塑"},
    {"产品名称": "膨胀螺栓", "规格": "M10x100", "数量": "两箱", "单位": "箱", "备注": "加急"}
]}"#;
