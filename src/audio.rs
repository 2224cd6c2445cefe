use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wraps raw PCM samples in a minimal RIFF/WAVE container.
/// The remote synthesis API returns headerless PCM.
pub fn wrap_pcm(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

struct WavInfo {
    fmt: Vec<u8>,
    data_offset: usize,
    data_size: u32,
    byte_rate: u32,
}

fn scan(bytes: &[u8]) -> Result<WavInfo> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(anyhow!("Not a RIFF/WAVE buffer"));
    }

    let mut fmt: Option<Vec<u8>> = None;
    let mut data_offset: Option<usize> = None;
    let mut data_size: Option<u32> = None;

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
        let body = pos + 8;

        if chunk_id == b"fmt " {
            let end = body + chunk_size as usize;
            if end > bytes.len() {
                return Err(anyhow!("Truncated fmt chunk"));
            }
            fmt = Some(bytes[body..end].to_vec());
        } else if chunk_id == b"data" {
            data_offset = Some(body);
            data_size = Some(chunk_size);
            break;
        }

        pos = body + chunk_size as usize;
    }

    let fmt = fmt.ok_or_else(|| anyhow!("Missing fmt chunk"))?;
    if fmt.len() < 16 {
        return Err(anyhow!("fmt chunk too short"));
    }
    let byte_rate = u32::from_le_bytes(fmt[8..12].try_into().unwrap());

    Ok(WavInfo {
        fmt,
        data_offset: data_offset.ok_or_else(|| anyhow!("Missing data chunk"))?,
        data_size: data_size.ok_or_else(|| anyhow!("Missing data chunk size"))?,
        byte_rate,
    })
}

/// Playback length of a WAV buffer, from its header alone.
pub fn duration(bytes: &[u8]) -> Result<Duration> {
    let info = scan(bytes)?;
    if info.byte_rate == 0 {
        return Err(anyhow!("WAV header has zero byte rate"));
    }
    Ok(Duration::from_secs_f64(
        info.data_size as f64 / info.byte_rate as f64,
    ))
}

/// Merges WAV segments by concatenating data chunks. All segments must share
/// the same fmt chunk (sample rate, channels, bit depth).
pub fn merge_wav_files(input_paths: &[PathBuf], output_path: &Path) -> Result<()> {
    if input_paths.is_empty() {
        return Ok(());
    }

    let mut base_fmt: Option<Vec<u8>> = None;
    let mut data = Vec::new();

    for path in input_paths {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let info = scan(&bytes).with_context(|| format!("Failed to parse WAV {:?}", path))?;

        match &base_fmt {
            None => base_fmt = Some(info.fmt.clone()),
            Some(fmt) if *fmt != info.fmt => {
                return Err(anyhow!(
                    "WAV format mismatch in {:?}. All segments must share sample rate and channels.",
                    path
                ));
            }
            Some(_) => {}
        }

        let end = info.data_offset + info.data_size as usize;
        if end > bytes.len() {
            return Err(anyhow!("Truncated data chunk in {:?}", path));
        }
        data.extend_from_slice(&bytes[info.data_offset..end]);
    }

    let fmt = base_fmt.expect("at least one input");
    let mut out = Vec::with_capacity(44 + data.len());
    out.extend_from_slice(b"RIFF");
    let chunk_size = 4 + 8 + fmt.len() as u32 + 8 + data.len() as u32;
    out.extend_from_slice(&chunk_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    out.extend_from_slice(&fmt);
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&data);

    fs::write(output_path, out).with_context(|| format!("Failed to write {:?}", output_path))?;
    Ok(())
}
