#![allow(dead_code)]

pub mod instrumented_store;
