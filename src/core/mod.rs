//! 核心步骤：定位、建环境、安装、证书、内核、服务器，以及串联它们的引导流程

pub mod installer;
pub mod kernels;
pub mod locator;
pub mod pipeline;
pub mod provisioner;
pub mod server;
pub mod truststore;
