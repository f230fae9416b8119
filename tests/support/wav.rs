use std::path::Path;

/// Write interleaved 16-bit PCM as a WAV file.
pub fn write_test_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Mono tone at a constant level, `seconds` long.
pub fn write_constant_wav(path: &Path, level: i16, seconds: f64, sample_rate: u32) {
    let len = (seconds * sample_rate as f64) as usize;
    write_test_wav(path, &vec![level; len], sample_rate, 1);
}
