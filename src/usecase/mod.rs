//! 用例层（usecase）：编排映射操作、全量校验与导出，形成可调用功能入口。

pub mod export;
pub mod manager;
pub mod service;
pub mod validate;
