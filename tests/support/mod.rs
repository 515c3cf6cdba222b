#![allow(dead_code)]

pub mod stub_gateways;
