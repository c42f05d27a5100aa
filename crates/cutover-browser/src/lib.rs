//! Browser driver capability for the cutover pipeline.
//!
//! The control plane never talks to a browser runtime directly; it
//! consumes the [`BrowserDriver`] trait family defined here. Two
//! implementations ship with the workspace: [`http::HttpBrowserDriver`],
//! a reqwest-backed driver for environments without a real browser
//! runtime, and [`scripted::ScriptedBrowserDriver`], a deterministic
//! in-memory driver used by the pipeline tests. A CDP- or
//! Playwright-backed driver plugs in behind the same traits.
//!
//! The crate also owns the raster primitives the visual stage builds
//! on: PNG encode/decode, nearest-neighbor resampling, and the
//! anti-alias-aware pixel comparator.

pub mod dom;
pub mod driver;
pub mod error;
pub mod http;
pub mod raster;
pub mod scripted;
pub mod types;

pub use driver::{BrowserContext, BrowserDriver, BrowserPage};
pub use error::{Error, Result};
pub use http::HttpBrowserDriver;
pub use scripted::{PageScript, ScriptedBrowserDriver, ScriptedSiteBuilder};
pub use raster::{PixelComparator, PixelDiffResult, ThresholdComparator};
pub use types::{
    ConsoleLevel, ConsoleMessage, FormField, FormFieldKind, FormSnapshot, JsError, LinkRef,
    Navigation, NetworkEvent, NetworkRequest, NetworkResponse, SubmitOutcome, Viewport,
};
