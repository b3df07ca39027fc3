//! JSON patch library loaded from a directory of documents.
//!
//! Each file holds one patch document in the THR Remote format (the same
//! JSON carried by `.thrl6p` files). Ids are 1-based positions in filename
//! order, which is the numbering the foot switches step through.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Top level of a THR Remote patch document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchDocument {
    #[serde(default)]
    pub data: DataDoc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataDoc {
    #[serde(default)]
    pub meta: MetaDoc,
    #[serde(default)]
    pub tone: ToneDoc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tnid: u32,
}

/// The `data.tone` object, one group per device unit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToneDoc {
    #[serde(rename = "THRGroupFX1Compressor", default)]
    pub compressor: CompressorDoc,
    #[serde(rename = "THRGroupGate", default)]
    pub gate: GateDoc,
    #[serde(rename = "THRGroupFX2Effect", default)]
    pub effect: EffectGroupDoc,
    #[serde(rename = "THRGroupFX3EffectEcho", default)]
    pub echo: EchoGroupDoc,
    #[serde(rename = "THRGroupFX4EffectReverb", default)]
    pub reverb: ReverbGroupDoc,
    #[serde(rename = "THRGroupAmp", default)]
    pub amp: AmpDoc,
    #[serde(rename = "THRGroupCab", default)]
    pub cab: CabDoc,
    #[serde(default)]
    pub global: GlobalDoc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompressorDoc {
    #[serde(rename = "@enabled", default)]
    pub enabled: bool,
    #[serde(rename = "Sustain", default)]
    pub sustain: f64,
    #[serde(rename = "Level", default)]
    pub level: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateDoc {
    #[serde(rename = "@enabled", default)]
    pub enabled: bool,
    /// Threshold in dB, -96..0
    #[serde(rename = "Thresh", default)]
    pub thresh: f64,
    #[serde(rename = "Decay", default)]
    pub decay: f64,
}

/// FX2 group. Only the parameter object of the active type is guaranteed
/// to be present; editors usually write all four.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectGroupDoc {
    #[serde(rename = "@enabled", default)]
    pub enabled: bool,
    #[serde(rename = "@asset", default)]
    pub asset: String,
    #[serde(rename = "StereoSquareChorus")]
    pub chorus: Option<ChorusDoc>,
    #[serde(rename = "L6Flanger")]
    pub flanger: Option<FlangerDoc>,
    #[serde(rename = "Phaser")]
    pub phaser: Option<PhaserDoc>,
    #[serde(rename = "BiasTremolo")]
    pub tremolo: Option<TremoloDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChorusDoc {
    #[serde(rename = "Freq", default)]
    pub freq: f64,
    #[serde(rename = "Depth", default)]
    pub depth: f64,
    #[serde(rename = "Pre", default)]
    pub pre: f64,
    #[serde(rename = "Feedback", default)]
    pub feedback: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlangerDoc {
    #[serde(rename = "Freq", default)]
    pub freq: f64,
    #[serde(rename = "Depth", default)]
    pub depth: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaserDoc {
    #[serde(rename = "Speed", default)]
    pub speed: f64,
    #[serde(rename = "Feedback", default)]
    pub feedback: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TremoloDoc {
    #[serde(rename = "Speed", default)]
    pub speed: f64,
    #[serde(rename = "Depth", default)]
    pub depth: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EchoGroupDoc {
    #[serde(rename = "@enabled", default)]
    pub enabled: bool,
    #[serde(rename = "@asset", default)]
    pub asset: String,
    #[serde(rename = "TapeEcho")]
    pub tape: Option<EchoUnitDoc>,
    #[serde(rename = "L6DigitalDelay")]
    pub digital: Option<EchoUnitDoc>,
}

/// Both echo types carry the same parameter set
#[derive(Debug, Clone, Deserialize)]
pub struct EchoUnitDoc {
    #[serde(rename = "Time", default)]
    pub time: f64,
    #[serde(rename = "Feedback", default)]
    pub feedback: f64,
    #[serde(rename = "Bass", default)]
    pub bass: f64,
    #[serde(rename = "Treble", default)]
    pub treble: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverbGroupDoc {
    #[serde(rename = "@enabled", default)]
    pub enabled: bool,
    #[serde(rename = "@asset", default)]
    pub asset: String,
    #[serde(rename = "StandardSpring")]
    pub spring: Option<SpringDoc>,
    #[serde(rename = "SmallRoom1")]
    pub room: Option<HallReverbDoc>,
    #[serde(rename = "LargePlate1")]
    pub plate: Option<HallReverbDoc>,
    #[serde(rename = "ReallyLargeHall")]
    pub hall: Option<HallReverbDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpringDoc {
    #[serde(rename = "Time", default)]
    pub time: f64,
    #[serde(rename = "Tone", default)]
    pub tone: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

/// Room, plate and hall reverbs share this parameter set
#[derive(Debug, Clone, Deserialize)]
pub struct HallReverbDoc {
    #[serde(rename = "Decay", default)]
    pub decay: f64,
    #[serde(rename = "PreDelay", default)]
    pub pre_delay: f64,
    #[serde(rename = "Tone", default)]
    pub tone: f64,
    #[serde(rename = "@wetDry", default)]
    pub wet_dry: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmpDoc {
    #[serde(rename = "@asset", default)]
    pub asset: String,
    #[serde(rename = "Drive", default)]
    pub drive: f64,
    #[serde(rename = "Master", default)]
    pub master: f64,
    #[serde(rename = "Bass", default)]
    pub bass: f64,
    #[serde(rename = "Mid", default)]
    pub mid: f64,
    #[serde(rename = "Treble", default)]
    pub treble: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CabDoc {
    #[serde(rename = "SpkSimType", default)]
    pub spk_sim_type: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalDoc {
    #[serde(rename = "THRPresetParamTempo", default)]
    pub tempo: u32,
}

impl PatchDocument {
    /// Parse a single patch document from JSON text
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse patch document")
    }

    /// Patch name as shown in listings
    pub fn name(&self) -> &str {
        &self.data.meta.name
    }
}

/// One loaded patch document plus its source file
#[derive(Debug, Clone)]
pub struct PatchEntry {
    pub name: String,
    pub path: PathBuf,
    pub doc: PatchDocument,
}

/// An ordered set of patch documents loaded from a directory
#[derive(Debug, Default)]
pub struct PatchLibrary {
    dir: PathBuf,
    entries: Vec<PatchEntry>,
}

impl PatchLibrary {
    /// Load every `.json`/`.thrl6p` document under `dir`, sorted by file
    /// name. A missing directory yields an empty library; malformed
    /// documents are skipped with a warning.
    pub async fn load(dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();

        if !dir.exists() {
            info!(
                "Patch directory {} does not exist, library is empty",
                dir.display()
            );
            return Ok(Self {
                dir: dir.to_path_buf(),
                entries,
            });
        }

        let mut reader = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read patch directory: {}", dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .with_context(|| format!("Failed to scan patch directory: {}", dir.display()))?
        {
            let path = entry.path();
            if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json") | Some("thrl6p")
            ) {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            let text = match fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping unreadable patch file {}: {}", path.display(), e);
                    continue;
                }
            };
            match PatchDocument::parse(&text) {
                Ok(doc) => {
                    let name = doc.data.meta.name.clone();
                    debug!(patch = %name, file = %path.display(), "loaded patch");
                    entries.push(PatchEntry { name, path, doc });
                }
                Err(e) => {
                    warn!("Skipping malformed patch file {}: {:#}", path.display(), e);
                }
            }
        }

        info!("Loaded {} patches from {}", entries.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Directory this library was loaded from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a patch by its 1-based id
    pub fn get(&self, id: usize) -> Option<&PatchEntry> {
        if id == 0 {
            return None;
        }
        self.entries.get(id - 1)
    }

    /// `(id, name)` pairs in listing order
    pub fn names(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i + 1, e.name.as_str()))
    }
}

/// Patch directory watcher that reloads the library on changes
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PatchLibrary>,
}

impl LibraryWatcher {
    /// Create a watcher for the specified patch directory.
    ///
    /// Returns the watcher plus the initially loaded library. The
    /// directory is created when absent so it can be watched.
    pub async fn new(dir: &Path) -> Result<(Self, PatchLibrary)> {
        let (tx, rx) = mpsc::channel(10);

        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create patch directory: {}", dir.display()))?;
            info!("Created patch directory {}", dir.display());
        }

        let initial = PatchLibrary::load(dir)
            .await
            .context("Failed to load initial patch library")?;

        let watched_dir = dir.to_path_buf();

        // Capture the Tokio runtime handle BEFORE creating the watcher
        // (notify callbacks run on their own OS thread, not in Tokio context)
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        debug!("Patch directory changed: {:?}", event.paths);

                        let dir = watched_dir.clone();
                        let tx = tx.clone();

                        // Use the captured runtime handle to spawn async task
                        runtime_handle.spawn(async move {
                            // Debounce: wait a bit for file writes to complete
                            tokio::time::sleep(Duration::from_millis(100)).await;

                            match PatchLibrary::load(&dir).await {
                                Ok(library) => {
                                    info!("Patch library reloaded ({} patches)", library.len());
                                    if let Err(e) = tx.send(library).await {
                                        error!("Failed to send library update: {}", e);
                                    }
                                }
                                Err(e) => {
                                    warn!("Failed to reload patch library (keeping old): {}", e);
                                }
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch patch directory: {}", dir.display()))?;

        info!("Patch directory watcher started for: {}", dir.display());

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial,
        ))
    }

    /// Wait for the next library reload
    /// Returns None if the watcher has been closed
    pub async fn next_library(&mut self) -> Option<PatchLibrary> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::types::{AmpModel, Collection, Control, EffectType, ReverbType, Unit};
    use crate::settings::SettingsAggregate;
    use serde_json::json;
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn demo_document() -> serde_json::Value {
        json!({
            "data": {
                "meta": { "name": "Full Canvas", "tnid": 12345 },
                "tone": {
                    "THRGroupAmp": {
                        "@asset": "THR10C_DC30",
                        "Drive": 0.40, "Master": 0.55,
                        "Bass": 0.50, "Mid": 0.62, "Treble": 0.47
                    },
                    "THRGroupCab": { "SpkSimType": 10 },
                    "THRGroupFX1Compressor": {
                        "@enabled": true, "Sustain": 0.35, "Level": 0.70
                    },
                    "THRGroupGate": {
                        "@enabled": true, "Thresh": -48.0, "Decay": 0.12
                    },
                    "THRGroupFX2Effect": {
                        "@enabled": true, "@asset": "BiasTremolo",
                        "BiasTremolo": { "Speed": 0.25, "Depth": 0.60, "@wetDry": 0.45 }
                    },
                    "THRGroupFX3EffectEcho": {
                        "@enabled": false, "@asset": "TapeEcho",
                        "TapeEcho": {
                            "Time": 0.38, "Feedback": 0.30,
                            "Bass": 0.50, "Treble": 0.55, "@wetDry": 0.25
                        }
                    },
                    "THRGroupFX4EffectReverb": {
                        "@enabled": true, "@asset": "ReallyLargeHall",
                        "ReallyLargeHall": {
                            "Decay": 0.28, "PreDelay": 0.10,
                            "Tone": 0.52, "@wetDry": 0.33
                        }
                    },
                    "global": { "THRPresetParamTempo": 110 }
                }
            }
        })
    }

    #[test]
    fn sparse_documents_parse_with_defaults() {
        let doc = PatchDocument::parse(r#"{"data":{"meta":{"name":"Sparse"},"tone":{}}}"#)
            .expect("sparse document");
        assert_eq!(doc.name(), "Sparse");
        assert_eq!(doc.data.meta.tnid, 0);
        assert!(!doc.data.tone.effect.enabled);
        assert!(doc.data.tone.effect.chorus.is_none());
        assert!(doc.data.tone.reverb.hall.is_none());
    }

    #[test]
    fn full_document_drives_the_settings_aggregate() {
        let doc: PatchDocument = serde_json::from_value(demo_document()).expect("demo document");
        let mut settings = SettingsAggregate::new();
        settings.load_document(&doc);

        assert_eq!(settings.active_name(), "Full Canvas");
        assert_eq!(settings.tnid, 12345);
        assert_eq!(settings.tempo, 110);

        assert_eq!(settings.collection, Collection::Boutique);
        assert_eq!(settings.amp, AmpModel::Clean);
        assert!(close(settings.control(Control::Gain), 40.0));
        assert!(close(settings.control(Control::Mid), 62.0));
        assert_eq!(settings.cabinet.id(), 10);

        assert!(settings.units.get(Unit::Compressor));
        assert!(settings.units.get(Unit::Gate));
        assert!(settings.units.get(Unit::Effect));
        assert!(!settings.units.get(Unit::Echo));
        assert!(settings.units.get(Unit::Reverb));

        assert_eq!(settings.effect.active, EffectType::Tremolo);
        assert!(close(settings.effect.tremolo.speed, 25.0));
        assert!(close(settings.effect.tremolo.depth, 60.0));
        assert!(close(settings.effect.mix, 45.0));

        // -48 dB maps to the midpoint of the percent range
        assert!(close(settings.gate.threshold, 50.0));
        assert!(close(settings.gate.decay, 12.0));

        assert!(close(settings.echo.tape.time, 38.0));

        assert_eq!(settings.reverb.active, ReverbType::Hall);
        assert!(close(settings.reverb.hall.decay, 28.0));
        assert!(close(settings.reverb.mix, 33.0));

        // the bulk load serializes exactly one patch write
        let frames = settings.take_outbox();
        assert!(!frames.is_empty());
    }

    #[tokio::test]
    async fn library_orders_patches_by_file_name() {
        let dir = TempDir::new().unwrap();
        std_fs::write(
            dir.path().join("01_lead.json"),
            r#"{"data":{"meta":{"name":"Lead"},"tone":{}}}"#,
        )
        .unwrap();
        std_fs::write(
            dir.path().join("00_clean.thrl6p"),
            r#"{"data":{"meta":{"name":"Clean"},"tone":{}}}"#,
        )
        .unwrap();
        std_fs::write(dir.path().join("notes.txt"), "not a patch").unwrap();

        let library = PatchLibrary::load(dir.path()).await.unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(1).unwrap().name, "Clean");
        assert_eq!(library.get(2).unwrap().name, "Lead");
        assert!(library.get(0).is_none());
        assert!(library.get(3).is_none());

        let names: Vec<_> = library.names().collect();
        assert_eq!(names, vec![(1, "Clean"), (2, "Lead")]);
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let dir = TempDir::new().unwrap();
        std_fs::write(
            dir.path().join("good.json"),
            r#"{"data":{"meta":{"name":"Good"},"tone":{}}}"#,
        )
        .unwrap();
        std_fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let library = PatchLibrary::load(dir.path()).await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.get(1).unwrap().name, "Good");
    }

    #[tokio::test]
    async fn missing_directory_yields_an_empty_library() {
        let dir = TempDir::new().unwrap();
        let library = PatchLibrary::load(&dir.path().join("nowhere")).await.unwrap();
        assert!(library.is_empty());
    }

    #[tokio::test]
    async fn watcher_reloads_on_new_files() -> Result<()> {
        let dir = TempDir::new()?;
        std_fs::write(
            dir.path().join("a.json"),
            r#"{"data":{"meta":{"name":"A"},"tone":{}}}"#,
        )?;

        let (mut watcher, library) = LibraryWatcher::new(dir.path()).await?;
        assert_eq!(library.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        std_fs::write(
            dir.path().join("b.json"),
            r#"{"data":{"meta":{"name":"B"},"tone":{}}}"#,
        )?;

        // Wait for reload (with timeout)
        let reloaded =
            tokio::time::timeout(Duration::from_secs(2), watcher.next_library()).await?;

        if let Some(reloaded) = reloaded {
            assert_eq!(reloaded.len(), 2);
            assert_eq!(reloaded.get(2).unwrap().name, "B");
        }

        Ok(())
    }
}
