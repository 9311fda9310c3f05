//! YOLO-style detection engine: loads a model file at construction,
//! exposes `detect`/`detect_batch`. Confidence and IoU thresholds are
//! fixed at load time.

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, ImageBuffer, Rgb};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use vigil_models::{BBox, Detection};

use crate::error::{InferenceError, InferenceResult};

/// COCO class names (80 classes), matching the default YOLOv8 taxonomy.
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

const NUM_CLASSES: usize = 80;
const NUM_BOXES: usize = 8400;
const NUM_FEATURES: usize = 84; // 4 bbox + 80 class scores

/// Which execution provider to bind the session to. The Orchestrator
/// decides this at worker-task launch time from the GPU Registry's
/// assignment, so the engine itself never probes hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(u32),
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/object_detection/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// `Frame -> []Detection`. Single-frame and batch object detection over a
/// loaded model; raises only on "model not loaded".
pub trait DetectionEngine: Send + Sync {
    fn detect(&self, image_data: &[u8], width: u32, height: u32) -> InferenceResult<Vec<Detection>>;

    /// Default batch implementation calls `detect` per frame; an engine
    /// backed by a runtime with real batching support may override this.
    fn detect_batch(&self, frames: &[(&[u8], u32, u32)]) -> InferenceResult<Vec<Vec<Detection>>> {
        frames
            .iter()
            .map(|(data, w, h)| self.detect(data, *w, *h))
            .collect()
    }
}

pub struct OnnxDetectionEngine {
    session: Mutex<Session>,
    config: DetectorConfig,
}

impl OnnxDetectionEngine {
    /// Loads the model at `config.model_path` bound to `device`. Returns
    /// an error if the file doesn't exist or fails to load — this is the
    /// only fatal error path; per-frame failures during `detect` never
    /// propagate a model-not-loaded variant once construction succeeds.
    pub fn new(config: DetectorConfig, device: Device) -> InferenceResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(InferenceError::ModelNotLoaded(config.model_path.clone()));
        }

        let session = Mutex::new(create_session(model_path, device)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            ?device,
            "detection engine initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn raw_to_image(&self, image_data: &[u8], width: u32, height: u32) -> InferenceResult<DynamicImage> {
        let expected_len = (width * height * 3) as usize;
        if image_data.len() != expected_len {
            return Err(InferenceError::InvalidFrame(format!(
                "expected {expected_len} bytes, got {}",
                image_data.len()
            )));
        }
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, image_data.to_vec())
            .ok_or_else(|| InferenceError::InvalidFrame("failed to build image buffer".to_string()))?;
        Ok(DynamicImage::ImageRgb8(buffer))
    }

    /// Resize to the model's square input, normalize to [0,1], pack NCHW.
    fn preprocess(&self, img: &DynamicImage) -> InferenceResult<Value> {
        let input_size = self.config.input_size;
        let resized = img.resize_exact(input_size, input_size, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::runtime(format!("failed to build input tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> InferenceResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::runtime("session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::runtime(format!("onnx inference failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| InferenceError::runtime("missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::runtime(format!("failed to extract tensor: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// YOLOv8 output format `[1, 84, 8400]`: 4 bbox values (center format)
    /// plus 80 class scores per candidate. Scales back to pixel space and
    /// applies NMS.
    fn postprocess(&self, outputs: &[f32], orig_width: u32, orig_height: u32) -> InferenceResult<Vec<Detection>> {
        if outputs.len() != NUM_FEATURES * NUM_BOXES {
            return Err(InferenceError::runtime(format!(
                "unexpected output size: expected {}, got {}",
                NUM_FEATURES * NUM_BOXES,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((NUM_FEATURES, NUM_BOXES), outputs.to_vec())
            .map_err(|e| InferenceError::runtime(format!("failed to reshape output: {e}")))?;
        let transposed = output_array.t(); // [8400, 84]

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates = Vec::new();

        for i in 0..NUM_BOXES {
            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let mut best_class = 0usize;
            let mut best_score = 0.0f32;
            for c in 0..NUM_CLASSES {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.confidence_threshold {
                continue;
            }

            let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, orig_height as f32);
            let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, orig_height as f32);

            candidates.push(Detection {
                class_id: best_class as u32,
                class_name: COCO_CLASSES.get(best_class).copied().unwrap_or("unknown").to_string(),
                confidence: best_score,
                bbox: BBox::new(x1, y1, x2, y2),
            });
        }

        Ok(self.non_maximum_suppression(candidates))
    }

    fn non_maximum_suppression(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        if detections.is_empty() {
            return detections;
        }
        detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

        let mut keep = Vec::new();
        let mut suppressed = vec![false; detections.len()];

        for i in 0..detections.len() {
            if suppressed[i] {
                continue;
            }
            keep.push(detections[i].clone());

            for j in (i + 1)..detections.len() {
                if suppressed[j] || detections[i].class_id != detections[j].class_id {
                    continue;
                }
                if detections[i].bbox.iou(&detections[j].bbox) > self.config.nms_threshold {
                    suppressed[j] = true;
                }
            }
        }

        keep
    }
}

impl DetectionEngine for OnnxDetectionEngine {
    fn detect(&self, image_data: &[u8], width: u32, height: u32) -> InferenceResult<Vec<Detection>> {
        if width == 0 || height == 0 || image_data.is_empty() {
            return Ok(Vec::new());
        }
        let img = self.raw_to_image(image_data, width, height)?;
        let input = self.preprocess(&img)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(&outputs, width, height)?;
        debug!(count = detections.len(), "frame detection complete");
        Ok(detections)
    }
}

/// Builds an ONNX Runtime session bound to `device`, falling back to CPU
/// if the requested execution provider cannot be built.
fn create_session(model_path: &Path, device: Device) -> InferenceResult<Session> {
    let model_bytes =
        std::fs::read(model_path).map_err(|e| InferenceError::runtime(format!("failed to read model file: {e}")))?;

    let builder = Session::builder()
        .map_err(|e| InferenceError::runtime(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::runtime(format!("failed to set optimization level: {e}")))?;

    if let Device::Cuda(index) = device {
        #[cfg(all(target_os = "linux", feature = "cuda"))]
        {
            use ort::execution_providers::CUDAExecutionProvider;
            if let Ok(cuda_builder) = builder.clone().with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(index as i32)
                .build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                    info!(device_id = index, "using CUDA execution provider");
                    return Ok(session);
                }
            }
            debug!("CUDA execution provider unavailable, falling back to CPU");
        }
        #[cfg(not(all(target_os = "linux", feature = "cuda")))]
        {
            let _ = index;
            debug!("CUDA requested but this build has no cuda execution provider, falling back to CPU");
        }
    }

    info!("using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| InferenceError::runtime(format!("failed to load onnx model: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_classes_match_yolov8_taxonomy() {
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES.len(), 80);
    }

    #[test]
    fn default_config_matches_yolov8n_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.input_size, 640);
        assert!((config.confidence_threshold - 0.25).abs() < 0.001);
        assert!((config.nms_threshold - 0.45).abs() < 0.001);
    }
}
