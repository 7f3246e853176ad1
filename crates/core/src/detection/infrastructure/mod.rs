pub mod math;
pub mod onnx_face_provider;
