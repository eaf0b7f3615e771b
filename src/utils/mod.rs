//! Utility modules for Yuri

pub mod logging;
