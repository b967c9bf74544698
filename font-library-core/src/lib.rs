#![doc = "font-library-core: core logic library for font-library."]

//! This crate contains the ingest pipeline that fills a Font Library record type
//! with font files: the folder downloader, the local scanner, the uploader and
//! the data store contract.
//!
//! # Usage
//! The CLI crate wires a concrete [`contract::FontStore`] (the Frappe REST client)
//! into [`uploader::upload_files`] / [`uploader::upload_directory`].

pub mod config;
pub mod contract;
pub mod download;
pub mod memory;
pub mod scan;
#[cfg(any(test, feature = "test-export-mocks"))]
pub mod stub_http;
pub mod uploader;
