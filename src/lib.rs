//! CanvasFE: a layered raster editor core.
//!
//! A [`scene::Scene`] holds free-drawn elements below image objects; the
//! [`compositor::Compositor`] rebuilds the canvas buffer from it after every
//! change. Documents persist through [`io`], user preferences through
//! [`settings`], and [`tools::Editor`] maps pointer and key input onto scene
//! operations.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod error;
pub mod geometry;
pub mod io;
pub mod ops;
pub mod project;
pub mod scene;
pub mod settings;
pub mod tools;
