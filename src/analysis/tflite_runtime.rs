//! Minimal TensorFlow Lite C API binding loaded at runtime.

use std::ffi::{CString, c_char, c_int, c_void};
use std::path::Path;

use libloading::Library;

use super::oracle::OracleError;

#[repr(C)]
struct TfLiteModel {
    _private: [u8; 0],
}
#[repr(C)]
struct TfLiteInterpreterOptions {
    _private: [u8; 0],
}
#[repr(C)]
struct TfLiteInterpreter {
    _private: [u8; 0],
}
#[repr(C)]
struct TfLiteTensor {
    _private: [u8; 0],
}

type TfLiteStatus = c_int;
type TfLiteType = c_int;

const TFLITE_OK: TfLiteStatus = 0;
const TFLITE_FLOAT32: TfLiteType = 1;

/// One loaded model with its interpreter. Not thread-safe; one per worker.
pub(crate) struct TfliteRuntime {
    api: TfliteApi,
    model: *mut TfLiteModel,
    options: *mut TfLiteInterpreterOptions,
    interpreter: *mut TfLiteInterpreter,
}

impl TfliteRuntime {
    pub(crate) fn load(model_path: &Path, lib_path: &Path, threads: i32) -> Result<Self, OracleError> {
        let api = TfliteApi::load(lib_path)?;
        let model_c = CString::new(model_path.to_string_lossy().as_bytes())
            .map_err(|_| OracleError::Load("Model path contains null bytes".to_string()))?;
        let model = unsafe { (api.model_create)(model_c.as_ptr()) };
        if model.is_null() {
            return Err(OracleError::Load(format!(
                "Failed to load TFLite model at {}",
                model_path.display()
            )));
        }
        let options = unsafe { (api.interpreter_options_create)() };
        if options.is_null() {
            unsafe { (api.model_delete)(model) };
            return Err(OracleError::Load(
                "Failed to create TFLite interpreter options".to_string(),
            ));
        }
        unsafe { (api.interpreter_options_set_num_threads)(options, threads.max(1)) };
        let interpreter = unsafe { (api.interpreter_create)(model, options) };
        if interpreter.is_null() {
            unsafe {
                (api.interpreter_options_delete)(options);
                (api.model_delete)(model);
            }
            return Err(OracleError::Load(
                "Failed to create TFLite interpreter".to_string(),
            ));
        }
        let runtime = Self {
            api,
            model,
            options,
            interpreter,
        };
        runtime.allocate()?;
        Ok(runtime)
    }

    /// Run the model on `input` and return the first float output whose last
    /// dimension is `output_dim` (or the first float output when `None`).
    ///
    /// Multi-frame outputs are mean-pooled into a single vector.
    pub(crate) fn run(
        &mut self,
        input: &[f32],
        output_dim: Option<usize>,
    ) -> Result<Vec<f32>, String> {
        let input_tensor = self.prepare_input(input.len())?;
        let byte_len = std::mem::size_of_val(input);
        let status = unsafe {
            (self.api.tensor_copy_from_buffer)(
                input_tensor,
                input.as_ptr() as *const c_void,
                byte_len,
            )
        };
        if status != TFLITE_OK {
            return Err("Failed to copy input tensor data".to_string());
        }
        let status = unsafe { (self.api.interpreter_invoke)(self.interpreter) };
        if status != TFLITE_OK {
            return Err("Failed to invoke TFLite interpreter".to_string());
        }
        self.read_output(output_dim)
    }

    fn allocate(&self) -> Result<(), OracleError> {
        let status = unsafe { (self.api.interpreter_allocate_tensors)(self.interpreter) };
        if status != TFLITE_OK {
            return Err(OracleError::Load(
                "Failed to allocate TFLite tensors".to_string(),
            ));
        }
        Ok(())
    }

    fn prepare_input(&mut self, len: usize) -> Result<*mut TfLiteTensor, String> {
        let expected_bytes = len * std::mem::size_of::<f32>();
        let tensor = self.input_tensor()?;
        let byte_size = unsafe { (self.api.tensor_byte_size)(tensor) };
        if byte_size == expected_bytes {
            return Ok(tensor);
        }
        // Waveform models declare a dynamic first dimension; resize to the window.
        let dims = [len as c_int];
        let status = unsafe {
            (self.api.interpreter_resize_input_tensor)(self.interpreter, 0, dims.as_ptr(), 1)
        };
        if status != TFLITE_OK {
            return Err(format!(
                "Input tensor holds {byte_size} bytes and cannot be resized for {expected_bytes}"
            ));
        }
        self.allocate().map_err(|err| err.to_string())?;
        let tensor = self.input_tensor()?;
        let byte_size = unsafe { (self.api.tensor_byte_size)(tensor) };
        if byte_size != expected_bytes {
            return Err(format!(
                "Input tensor holds {byte_size} bytes after resize, expected {expected_bytes}"
            ));
        }
        Ok(tensor)
    }

    fn input_tensor(&self) -> Result<*mut TfLiteTensor, String> {
        let tensor = unsafe { (self.api.interpreter_get_input_tensor)(self.interpreter, 0) };
        if tensor.is_null() {
            return Err("Failed to get TFLite input tensor".to_string());
        }
        let tensor_type = unsafe { (self.api.tensor_type)(tensor) };
        if tensor_type != TFLITE_FLOAT32 {
            return Err(format!("Unexpected input tensor type {tensor_type}"));
        }
        Ok(tensor)
    }

    fn read_output(&self, output_dim: Option<usize>) -> Result<Vec<f32>, String> {
        let output_count =
            unsafe { (self.api.interpreter_get_output_tensor_count)(self.interpreter) };
        for index in 0..output_count.max(0) {
            let tensor =
                unsafe { (self.api.interpreter_get_output_tensor)(self.interpreter, index) };
            if tensor.is_null() {
                continue;
            }
            if unsafe { (self.api.tensor_type)(tensor) } != TFLITE_FLOAT32 {
                continue;
            }
            let dims = tensor_dims(&self.api, tensor);
            let Some(&last) = dims.last() else {
                continue;
            };
            let last = last.max(1) as usize;
            if output_dim.is_some_and(|dim| dim != last) {
                continue;
            }
            let element_count: usize = dims.iter().map(|&dim| dim.max(1) as usize).product();
            let mut data = vec![0.0_f32; element_count];
            let status = unsafe {
                (self.api.tensor_copy_to_buffer)(
                    tensor,
                    data.as_mut_ptr() as *mut c_void,
                    std::mem::size_of_val(data.as_slice()),
                )
            };
            if status != TFLITE_OK {
                return Err("Failed to read TFLite output tensor".to_string());
            }
            return Ok(mean_pool(&data, last));
        }
        Err(match output_dim {
            Some(dim) => format!("No float output with {dim} values per frame"),
            None => "No float output tensor available".to_string(),
        })
    }
}

impl Drop for TfliteRuntime {
    fn drop(&mut self) {
        unsafe {
            (self.api.interpreter_delete)(self.interpreter);
            (self.api.interpreter_options_delete)(self.options);
            (self.api.model_delete)(self.model);
        }
    }
}

fn mean_pool(data: &[f32], frame_len: usize) -> Vec<f32> {
    let frame_count = data.len() / frame_len.max(1);
    if frame_count <= 1 {
        return data.to_vec();
    }
    let mut pooled = vec![0.0_f32; frame_len];
    for frame in data.chunks_exact(frame_len) {
        for (sum, value) in pooled.iter_mut().zip(frame) {
            *sum += *value;
        }
    }
    for value in &mut pooled {
        *value /= frame_count as f32;
    }
    pooled
}

fn tensor_dims(api: &TfliteApi, tensor: *const TfLiteTensor) -> Vec<i32> {
    let count = unsafe { (api.tensor_num_dims)(tensor) };
    (0..count.max(0))
        .map(|index| unsafe { (api.tensor_dim)(tensor, index) })
        .collect()
}

/// Resolved C entry points. Function pointers stay valid while `_lib` is loaded.
struct TfliteApi {
    _lib: Library,
    model_create: unsafe extern "C" fn(*const c_char) -> *mut TfLiteModel,
    model_delete: unsafe extern "C" fn(*mut TfLiteModel),
    interpreter_options_create: unsafe extern "C" fn() -> *mut TfLiteInterpreterOptions,
    interpreter_options_delete: unsafe extern "C" fn(*mut TfLiteInterpreterOptions),
    interpreter_options_set_num_threads: unsafe extern "C" fn(*mut TfLiteInterpreterOptions, c_int),
    interpreter_create: unsafe extern "C" fn(
        *const TfLiteModel,
        *const TfLiteInterpreterOptions,
    ) -> *mut TfLiteInterpreter,
    interpreter_delete: unsafe extern "C" fn(*mut TfLiteInterpreter),
    interpreter_allocate_tensors: unsafe extern "C" fn(*mut TfLiteInterpreter) -> TfLiteStatus,
    interpreter_resize_input_tensor:
        unsafe extern "C" fn(*mut TfLiteInterpreter, c_int, *const c_int, c_int) -> TfLiteStatus,
    interpreter_get_input_tensor:
        unsafe extern "C" fn(*const TfLiteInterpreter, c_int) -> *mut TfLiteTensor,
    interpreter_get_output_tensor:
        unsafe extern "C" fn(*const TfLiteInterpreter, c_int) -> *const TfLiteTensor,
    interpreter_get_output_tensor_count: unsafe extern "C" fn(*const TfLiteInterpreter) -> c_int,
    interpreter_invoke: unsafe extern "C" fn(*mut TfLiteInterpreter) -> TfLiteStatus,
    tensor_copy_from_buffer:
        unsafe extern "C" fn(*mut TfLiteTensor, *const c_void, usize) -> TfLiteStatus,
    tensor_copy_to_buffer:
        unsafe extern "C" fn(*const TfLiteTensor, *mut c_void, usize) -> TfLiteStatus,
    tensor_type: unsafe extern "C" fn(*const TfLiteTensor) -> TfLiteType,
    tensor_num_dims: unsafe extern "C" fn(*const TfLiteTensor) -> c_int,
    tensor_dim: unsafe extern "C" fn(*const TfLiteTensor, c_int) -> c_int,
    tensor_byte_size: unsafe extern "C" fn(*const TfLiteTensor) -> usize,
}

impl TfliteApi {
    fn load(path: &Path) -> Result<Self, OracleError> {
        let lib = unsafe { Library::new(path) }.map_err(|err| {
            OracleError::Load(format!(
                "Failed to load TFLite runtime at {}: {err}",
                path.display()
            ))
        })?;
        unsafe {
            Ok(TfliteApi {
                model_create: symbol(&lib, b"TfLiteModelCreateFromFile\0")?,
                model_delete: symbol(&lib, b"TfLiteModelDelete\0")?,
                interpreter_options_create: symbol(&lib, b"TfLiteInterpreterOptionsCreate\0")?,
                interpreter_options_delete: symbol(&lib, b"TfLiteInterpreterOptionsDelete\0")?,
                interpreter_options_set_num_threads: symbol(&lib, b"TfLiteInterpreterOptionsSetNumThreads\0")?,
                interpreter_create: symbol(&lib, b"TfLiteInterpreterCreate\0")?,
                interpreter_delete: symbol(&lib, b"TfLiteInterpreterDelete\0")?,
                interpreter_allocate_tensors: symbol(&lib, b"TfLiteInterpreterAllocateTensors\0")?,
                interpreter_resize_input_tensor: symbol(&lib, b"TfLiteInterpreterResizeInputTensor\0")?,
                interpreter_get_input_tensor: symbol(&lib, b"TfLiteInterpreterGetInputTensor\0")?,
                interpreter_get_output_tensor: symbol(&lib, b"TfLiteInterpreterGetOutputTensor\0")?,
                interpreter_get_output_tensor_count: symbol(&lib, b"TfLiteInterpreterGetOutputTensorCount\0")?,
                interpreter_invoke: symbol(&lib, b"TfLiteInterpreterInvoke\0")?,
                tensor_copy_from_buffer: symbol(&lib, b"TfLiteTensorCopyFromBuffer\0")?,
                tensor_copy_to_buffer: symbol(&lib, b"TfLiteTensorCopyToBuffer\0")?,
                tensor_type: symbol(&lib, b"TfLiteTensorType\0")?,
                tensor_num_dims: symbol(&lib, b"TfLiteTensorNumDims\0")?,
                tensor_dim: symbol(&lib, b"TfLiteTensorDim\0")?,
                tensor_byte_size: symbol(&lib, b"TfLiteTensorByteSize\0")?,
                _lib: lib,
            })
        }
    }
}

/// Copy a function pointer out of `lib`.
///
/// # Safety
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, OracleError> {
    let resolved = unsafe { lib.get::<T>(name) }.map_err(|err| {
        OracleError::Load(format!(
            "Failed to load TFLite symbol {}: {err}",
            String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name))
        ))
    })?;
    Ok(*resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_averages_frames() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(mean_pool(&data, 3), vec![2.5, 3.5, 4.5]);
    }

    #[test]
    fn mean_pool_passes_single_frame_through() {
        assert_eq!(mean_pool(&[0.25, 0.75], 2), vec![0.25, 0.75]);
    }

    #[test]
    fn missing_runtime_library_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TfliteApi::load(&dir.path().join("libtensorflowlite_c.so"))
            .err()
            .unwrap();
        assert!(matches!(err, OracleError::Load(_)));
    }
}
