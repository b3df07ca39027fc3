//! Interactive control console.
//!
//! A rustyline loop on its own thread turns typed lines into
//! [`ConsoleCommand`]s for the engine task. Parsing is kept apart from
//! the terminal loop so the grammar is testable.

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::EngineStatus;
use crate::patchlib::PatchLibrary;
use crate::settings::types::{
    AmpModel, Cabinet, Collection, CompressorParam, Control, EchoParam, EchoType, EffectParam,
    EffectType, GateParam, ReverbParam, ReverbType, Unit,
};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    ListPatches,
    ActivatePatch(usize),
    Deactivate,
    SetControl(Control, f64),
    SelectAmp(Collection, AmpModel),
    SelectCabinet(Cabinet),
    SwitchUnit(Unit, bool),
    SelectEffect(EffectType),
    SetEffect(EffectParam, f64),
    SelectEcho(EchoType),
    SetEcho(EchoParam, f64),
    SelectReverb(ReverbType),
    SetReverb(ReverbParam, f64),
    SetCompressor(CompressorParam, f64),
    SetGate(GateParam, f64),
    Boost(bool),
    Rename(String),
    SaveSlot(u8),
    PushPatch,
    RequestDump,
    Restart,
    ShowStatus,
    Help,
    Quit,
}

/// Parse one non-empty console line. A single word after a family verb
/// selects the type; a word plus a number sets a parameter of the
/// active type.
pub fn parse(line: &str) -> Result<ConsoleCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        bail!("empty line");
    };

    match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "status" => Ok(ConsoleCommand::ShowStatus),
        "patches" | "ls" => Ok(ConsoleCommand::ListPatches),
        "back" => Ok(ConsoleCommand::Deactivate),
        "apply" => Ok(ConsoleCommand::PushPatch),
        "dump" => Ok(ConsoleCommand::RequestDump),
        "reset" => Ok(ConsoleCommand::Restart),
        "patch" => match args {
            [id] => Ok(ConsoleCommand::ActivatePatch(
                id.parse()
                    .map_err(|_| anyhow!("'{id}' is not a patch number"))?,
            )),
            _ => bail!("usage: patch <number>"),
        },
        "set" => match args {
            [control, value] => Ok(ConsoleCommand::SetControl(
                control_named(control)?,
                number(value)?,
            )),
            _ => bail!("usage: set <gain|master|bass|mid|treble> <0-100>"),
        },
        "amp" => match args {
            [collection, model] => Ok(ConsoleCommand::SelectAmp(
                collection_named(collection)?,
                amp_named(model)?,
            )),
            _ => bail!("usage: amp <classic|boutique|modern> <model>"),
        },
        "cab" => match args {
            [id] => {
                let id: u8 = id
                    .parse()
                    .map_err(|_| anyhow!("'{id}' is not a cabinet id"))?;
                let cab =
                    Cabinet::new(id).ok_or_else(|| anyhow!("cabinet ids run 0-{}", Cabinet::MAX))?;
                Ok(ConsoleCommand::SelectCabinet(cab))
            }
            _ => bail!("usage: cab <0-16>"),
        },
        on_off @ ("on" | "off") => match args {
            [unit] => Ok(ConsoleCommand::SwitchUnit(unit_named(unit)?, on_off == "on")),
            _ => bail!("usage: {on_off} <comp|gate|effect|echo|reverb>"),
        },
        "effect" | "fx" => match args {
            [ty] => Ok(ConsoleCommand::SelectEffect(effect_type_named(ty)?)),
            [param, value] => Ok(ConsoleCommand::SetEffect(
                effect_param_named(param)?,
                number(value)?,
            )),
            _ => bail!("usage: effect <type> | effect <param> <value>"),
        },
        "echo" => match args {
            [ty] => Ok(ConsoleCommand::SelectEcho(echo_type_named(ty)?)),
            [param, value] => Ok(ConsoleCommand::SetEcho(
                echo_param_named(param)?,
                number(value)?,
            )),
            _ => bail!("usage: echo <type> | echo <param> <value>"),
        },
        "reverb" => match args {
            [ty] => Ok(ConsoleCommand::SelectReverb(reverb_type_named(ty)?)),
            [param, value] => Ok(ConsoleCommand::SetReverb(
                reverb_param_named(param)?,
                number(value)?,
            )),
            _ => bail!("usage: reverb <type> | reverb <param> <value>"),
        },
        "comp" => match args {
            [param, value] => Ok(ConsoleCommand::SetCompressor(
                compressor_param_named(param)?,
                number(value)?,
            )),
            _ => bail!("usage: comp <sustain|level|mix> <value>"),
        },
        "gate" => match args {
            [param, value] => Ok(ConsoleCommand::SetGate(
                gate_param_named(param)?,
                number(value)?,
            )),
            _ => bail!("usage: gate <threshold|decay> <value>"),
        },
        "boost" => match args {
            [word] => Ok(ConsoleCommand::Boost(on_off_named(word)?)),
            _ => bail!("usage: boost <on|off>"),
        },
        "name" => {
            if args.is_empty() {
                bail!("usage: name <text>");
            }
            Ok(ConsoleCommand::Rename(args.join(" ")))
        }
        "save" => match args {
            [slot] => Ok(ConsoleCommand::SaveSlot(
                slot.parse()
                    .map_err(|_| anyhow!("'{slot}' is not a slot number"))?,
            )),
            _ => bail!("usage: save <1-5>"),
        },
        other => bail!("unknown command '{other}', try help"),
    }
}

fn number(word: &str) -> Result<f64> {
    word.parse()
        .map_err(|_| anyhow!("'{word}' is not a number"))
}

fn on_off_named(word: &str) -> Result<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => bail!("expected on or off, got '{word}'"),
    }
}

fn control_named(word: &str) -> Result<Control> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "gain" => Control::Gain,
        "master" => Control::Master,
        "bass" => Control::Bass,
        "mid" | "middle" => Control::Mid,
        "treble" => Control::Treble,
        _ => bail!("unknown control '{word}', expected gain/master/bass/mid/treble"),
    })
}

fn collection_named(word: &str) -> Result<Collection> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "classic" => Collection::Classic,
        "boutique" => Collection::Boutique,
        "modern" => Collection::Modern,
        _ => bail!("unknown collection '{word}', expected classic/boutique/modern"),
    })
}

fn amp_named(word: &str) -> Result<AmpModel> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "clean" => AmpModel::Clean,
        "crunch" => AmpModel::Crunch,
        "lead" => AmpModel::Lead,
        "higain" | "hi-gain" => AmpModel::HiGain,
        "special" => AmpModel::Special,
        "bass" => AmpModel::Bass,
        "aco" | "acoustic" => AmpModel::Aco,
        "flat" => AmpModel::Flat,
        _ => bail!("unknown amp model '{word}'"),
    })
}

fn unit_named(word: &str) -> Result<Unit> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "comp" | "compressor" => Unit::Compressor,
        "gate" => Unit::Gate,
        "effect" | "fx" => Unit::Effect,
        "echo" | "delay" => Unit::Echo,
        "reverb" => Unit::Reverb,
        _ => bail!("unknown unit '{word}', expected comp/gate/effect/echo/reverb"),
    })
}

fn effect_type_named(word: &str) -> Result<EffectType> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "chorus" => EffectType::Chorus,
        "flanger" => EffectType::Flanger,
        "phaser" => EffectType::Phaser,
        "tremolo" => EffectType::Tremolo,
        _ => bail!("unknown effect type '{word}', expected chorus/flanger/phaser/tremolo"),
    })
}

fn effect_param_named(word: &str) -> Result<EffectParam> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "depth" => EffectParam::Depth,
        "feedback" => EffectParam::Feedback,
        "speed" => EffectParam::Speed,
        "predelay" => EffectParam::Predelay,
        "mix" => EffectParam::Mix,
        _ => bail!("unknown effect parameter '{word}'"),
    })
}

fn echo_type_named(word: &str) -> Result<EchoType> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "tape" => EchoType::TapeEcho,
        "digital" => EchoType::DigitalDelay,
        _ => bail!("unknown echo type '{word}', expected tape/digital"),
    })
}

fn echo_param_named(word: &str) -> Result<EchoParam> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "bass" => EchoParam::Bass,
        "feedback" => EchoParam::Feedback,
        "time" => EchoParam::Time,
        "treble" => EchoParam::Treble,
        "mix" => EchoParam::Mix,
        _ => bail!("unknown echo parameter '{word}'"),
    })
}

fn reverb_type_named(word: &str) -> Result<ReverbType> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "spring" => ReverbType::Spring,
        "room" => ReverbType::Room,
        "plate" => ReverbType::Plate,
        "hall" => ReverbType::Hall,
        _ => bail!("unknown reverb type '{word}', expected spring/room/plate/hall"),
    })
}

fn reverb_param_named(word: &str) -> Result<ReverbParam> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "time" => ReverbParam::Time,
        "tone" => ReverbParam::Tone,
        "decay" => ReverbParam::Decay,
        "predelay" => ReverbParam::Predelay,
        "mix" => ReverbParam::Mix,
        _ => bail!("unknown reverb parameter '{word}'"),
    })
}

fn compressor_param_named(word: &str) -> Result<CompressorParam> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "sustain" => CompressorParam::Sustain,
        "level" => CompressorParam::Level,
        "mix" => CompressorParam::Mix,
        _ => bail!("unknown compressor parameter '{word}'"),
    })
}

fn gate_param_named(word: &str) -> Result<GateParam> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "threshold" => GateParam::Threshold,
        "decay" => GateParam::Decay,
        _ => bail!("unknown gate parameter '{word}'"),
    })
}

/// Run the readline loop on a dedicated thread. Parsed commands go out
/// on `tx`; the thread ends on quit, EOF or a closed channel.
pub fn spawn(tx: mpsc::Sender<ConsoleCommand>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_blocking(&tx) {
            debug!("Console loop ended: {e:#}");
        }
    })
}

fn run_blocking(tx: &mpsc::Sender<ConsoleCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Type 'help' for commands.".dimmed());
    loop {
        match rl.readline("thr> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                match parse(trimmed) {
                    Ok(cmd) => {
                        let quit = matches!(cmd, ConsoleCommand::Quit);
                        if tx.blocking_send(cmd).is_err() || quit {
                            return Ok(());
                        }
                    }
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.blocking_send(ConsoleCommand::Quit);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn print_help() {
    println!("{}", "Commands".bold());
    println!("  patches                   list the patch library");
    println!("  patch <n>                 activate patch n");
    println!("  back                      restore the pre-patch sound");
    println!("  set <control> <0-100>     gain/master/bass/mid/treble");
    println!("  amp <collection> <model>  e.g. amp modern lead");
    println!("  cab <0-16>                cabinet simulation");
    println!("  on|off <unit>             comp/gate/effect/echo/reverb");
    println!("  effect <type|param val>   chorus/flanger/phaser/tremolo");
    println!("  echo <type|param val>     tape/digital");
    println!("  reverb <type|param val>   spring/room/plate/hall");
    println!("  comp <param> <value>      sustain/level/mix");
    println!("  gate <param> <value>      threshold/decay");
    println!("  boost <on|off>            raise gain by 40, restorable");
    println!("  name <text>               rename the current sound");
    println!("  save <1-5>                write a user memory slot");
    println!("  apply                     send the whole current sound");
    println!("  dump                      re-request the settings dump");
    println!("  reset                     redo the handshake");
    println!("  status                    connection and sound state");
    println!("  quit");
}

pub fn print_status(status: &EngineStatus) {
    let model = status.model.unwrap_or("not identified");
    let firmware = status.firmware.as_deref().unwrap_or("?");
    println!("{} {} (firmware {})", "Amp:".bold(), model, firmware);

    let name = if status.patch_name.is_empty() {
        "(unnamed)"
    } else {
        status.patch_name.as_str()
    };
    match status.active_patch {
        Some(id) => println!("{} #{id} {name}", "Sound:".bold()),
        None => println!("{} {name}", "Sound:".bold()),
    }

    let mut flags = Vec::new();
    flags.push(if status.live {
        "live".green().to_string()
    } else {
        "offline".yellow().to_string()
    });
    if status.dirty {
        flags.push("edited".yellow().to_string());
    }
    if status.boost {
        flags.push("boost".red().to_string());
    }
    println!("{} {}", "State:".bold(), flags.join(" "));
    println!(
        "{} {} outbound, {} patches in the library",
        "Queue:".bold(),
        status.outbound_pending,
        status.library_len
    );
}

pub fn print_patches(library: &PatchLibrary, active: Option<usize>) {
    if library.is_empty() {
        println!("{}", "No patches loaded.".dimmed());
        return;
    }
    for (id, name) in library.names() {
        let marker = if active == Some(id) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(" {marker} {id:3}  {name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_map_to_commands() {
        assert_eq!(parse("patches").unwrap(), ConsoleCommand::ListPatches);
        assert_eq!(parse("patch 3").unwrap(), ConsoleCommand::ActivatePatch(3));
        assert_eq!(
            parse("set gain 42.5").unwrap(),
            ConsoleCommand::SetControl(Control::Gain, 42.5)
        );
        assert_eq!(
            parse("amp modern lead").unwrap(),
            ConsoleCommand::SelectAmp(Collection::Modern, AmpModel::Lead)
        );
        assert_eq!(
            parse("off reverb").unwrap(),
            ConsoleCommand::SwitchUnit(Unit::Reverb, false)
        );
        assert_eq!(parse("boost on").unwrap(), ConsoleCommand::Boost(true));
        assert_eq!(parse("save 2").unwrap(), ConsoleCommand::SaveSlot(2));
        assert_eq!(parse("apply").unwrap(), ConsoleCommand::PushPatch);
    }

    #[test]
    fn family_words_select_or_set() {
        assert_eq!(
            parse("effect tremolo").unwrap(),
            ConsoleCommand::SelectEffect(EffectType::Tremolo)
        );
        assert_eq!(
            parse("effect depth 80").unwrap(),
            ConsoleCommand::SetEffect(EffectParam::Depth, 80.0)
        );
        assert_eq!(
            parse("echo tape").unwrap(),
            ConsoleCommand::SelectEcho(EchoType::TapeEcho)
        );
        assert_eq!(
            parse("reverb hall").unwrap(),
            ConsoleCommand::SelectReverb(ReverbType::Hall)
        );
        assert_eq!(
            parse("comp mix 25").unwrap(),
            ConsoleCommand::SetCompressor(CompressorParam::Mix, 25.0)
        );
        assert_eq!(
            parse("gate threshold 35").unwrap(),
            ConsoleCommand::SetGate(GateParam::Threshold, 35.0)
        );
    }

    #[test]
    fn case_and_aliases_are_accepted() {
        assert_eq!(
            parse("SET Mid 50").unwrap(),
            ConsoleCommand::SetControl(Control::Mid, 50.0)
        );
        assert_eq!(
            parse("on fx").unwrap(),
            ConsoleCommand::SwitchUnit(Unit::Effect, true)
        );
        assert_eq!(
            parse("amp classic hi-gain").unwrap(),
            ConsoleCommand::SelectAmp(Collection::Classic, AmpModel::HiGain)
        );
        assert_eq!(parse("exit").unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn rename_keeps_the_words() {
        assert_eq!(
            parse("name Big Lead 2").unwrap(),
            ConsoleCommand::Rename("Big Lead 2".into())
        );
    }

    #[test]
    fn bad_input_reports_usage() {
        assert!(parse("patch").is_err());
        assert!(parse("patch two").is_err());
        assert!(parse("set gain").is_err());
        assert!(parse("set gain loud").is_err());
        assert!(parse("cab 40").is_err());
        assert!(parse("boost").is_err());
        assert!(parse("warp 9").is_err());
    }
}
