//! Kaizen admin - content administration for a martial-arts club website
//!
//! This library provides the admin back office: staff sign-in, gallery events,
//! blog posts, hosted images and the public read API the club site consumes.

pub mod api;
pub mod auth;
pub mod cache;
pub mod cloudinary;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
