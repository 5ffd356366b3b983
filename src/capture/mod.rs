//! Detection sources
//!
//! A pipeline is fed by exactly one source, chosen once when it is built:
//! the camera when the host has one and it opens, the pointer otherwise.

pub mod camera;
pub mod pointer;
pub mod replay;
pub mod source;

pub use camera::{
    CameraConfig, CameraSource, FrameGrabber, GestureRecognizer, RecognizedHand, RecognizerOptions,
};
pub use pointer::{PointerHandle, PointerSource};
pub use replay::{ReplayFrame, ReplaySource};
pub use source::{Detection, DetectionError, DetectionSource, SourceError, SourceKind, SourceResult};

/// Host capability query and camera factory
pub trait CameraProvider {
    fn camera_present(&self) -> bool;

    fn open_camera(&self, config: &CameraConfig) -> SourceResult<CameraSource>;
}

/// Pick the camera when available, falling back to the pointer source
pub fn select_source(
    provider: &dyn CameraProvider,
    config: &CameraConfig,
    pointer: PointerSource,
) -> Box<dyn DetectionSource> {
    if !provider.camera_present() {
        tracing::info!("No camera present, using pointer controls");
        return Box::new(pointer);
    }

    match provider.open_camera(config) {
        Ok(camera) => {
            tracing::info!("Using camera detection source");
            Box::new(camera)
        }
        Err(e) => {
            tracing::warn!("Camera initialization failed, using pointer controls: {}", e);
            Box::new(pointer)
        }
    }
}
