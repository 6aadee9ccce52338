//! 核心层（core）：稳定数据模型、模板目录、ID 生成与导出行构建。

pub mod idgen;
pub mod model;
pub mod rows;
pub mod template;
