//! Playback commands.
//!
//! `play` drives the player the way a command dispatcher would: it starts
//! the first song, keeps the queue slot filled with the next one, reports
//! what the decoder is playing and skips past songs that fail.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{self, OutputKind};
use crate::metadata;
use crate::model::Song;
use crate::player::{self, Player, PlayerState, QueueState};

/// How often the play loop checks on the player.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Command-line overrides for the `[audio]` config section.
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub seek: Option<f64>,
    pub volume: Option<u32>,
    pub crossfade: Option<f32>,
    pub output: Option<OutputKind>,
    pub device: Option<String>,
}

/// Check if a path has a playable audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "mp3" | "flac" | "ogg" | "wav" | "m4a" | "aac"
            )
        })
        .unwrap_or(false)
}

/// Expand directories into their audio files (recursively, sorted); plain
/// file arguments are kept as given.
pub fn collect_audio_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| is_audio_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

/// Play files in order.
pub fn cmd_play(paths: &[PathBuf], options: &PlayOptions) -> anyhow::Result<()> {
    let files = collect_audio_files(paths);
    if files.is_empty() {
        bail!("No audio files found");
    }

    let mut audio = config::load().audio;
    if let Some(volume) = options.volume {
        audio.software_volume = volume;
    }
    if let Some(crossfade) = options.crossfade {
        audio.crossfade_seconds = crossfade;
    }
    if let Some(output) = options.output {
        audio.output = output;
    }
    if let Some(device) = &options.device {
        audio.output_device = device.clone();
    }

    let songs: Vec<Song> = files
        .iter()
        .map(|path| {
            metadata::read_song(path).unwrap_or_else(|e| {
                debug!(path = %path.display(), "no tags: {}", e);
                Song::from_path(path)
            })
        })
        .collect();

    let player = Player::from_config(&audio)?;
    info!(songs = songs.len(), output = ?audio.output, "starting playback");

    let mut current = 0;
    let mut queued: Option<usize> = None;
    player.play(&songs[current]);
    if let Some(position) = options.seek
        && let Err(e) = player.seek(&songs[current], position)
    {
        warn!(code = e.ack_code(), "seek failed: {}", e);
    }

    let ticker = crossbeam_channel::tick(POLL_INTERVAL);
    loop {
        ticker.recv()?;

        if let Some(song) = player.current_decode_song() {
            let status = player.status();
            println!(
                "▶ {} - {} [{}] ({})",
                song.display_artist(),
                song.display_title(),
                status.duration_str(),
                status.format_info()
            );
        }

        if let Some(message) = player.error_message() {
            eprintln!("error: {message}");
            player.clear_error();
        }

        // The decoder consumed the queued song
        if let Some(next) = queued
            && player.queue_state() == QueueState::Blank
        {
            current = next;
            queued = None;
        }

        match player.state() {
            PlayerState::Stopped => {
                current += 1;
                if current >= songs.len() {
                    break;
                }
                queued = None;
                player.play(&songs[current]);
            }
            PlayerState::Playing | PlayerState::Paused => {
                let next = current + 1;
                if queued.is_none() && next < songs.len() {
                    match player.queue_song(&songs[next]) {
                        Ok(()) => queued = Some(next),
                        Err(e) => debug!("queue refused: {}", e),
                    }
                }
            }
        }
    }

    let played = player.total_play_time();
    player.shutdown();
    println!(
        "Done. Played {}.",
        player::format_duration(Duration::from_secs_f64(played.max(0.0)))
    );
    Ok(())
}

/// List audio output devices.
pub fn cmd_devices() -> anyhow::Result<()> {
    let devices = player::list_devices()?;
    if devices.is_empty() {
        println!("No output devices found.");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}
