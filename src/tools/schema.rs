//! 工具参数 Schema 与校验（schemars 自动生成）
//!
//! 每个工具的参数是一个带 JsonSchema + Deserialize 的结构体：同一类型既生成暴露给模型的 schema，
//! 又在执行前反序列化校验参数，二者不会漂移。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 生成参数类型的 JSON Schema（去掉 $schema / title 等模型不需要的元信息）
pub fn schema_of<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// 按声明的参数类型校验并解析参数
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {e}"))
}
