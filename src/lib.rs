//! # Rengen
//!
//! 放射科工作流看板客户端的聚合入口，供演示程序使用。

pub use rengen_client;
pub use rengen_core;
pub use rengen_workflow;
