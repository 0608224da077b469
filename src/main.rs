//! Headless demo driver
//!
//! Plays each minigame with a scripted autoplayer at a steady 60 Hz and logs
//! the results against an in-memory high score table. Pass a path to a JSON
//! configuration document to override the default tuning, and a seed to vary
//! the runs.

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;

    use jianghu_minigames::consts::DEMO_FRAME_MS;
    use jianghu_minigames::content::Catalog;
    use jianghu_minigames::games::fishing::FishingStage;
    use jianghu_minigames::games::{Archery, Fishing, HorseTaming, Melody, PitchPot};
    use jianghu_minigames::sim::{InputEvent, Key, Phase, PotMode, Summary};
    use jianghu_minigames::{ConfigError, GameConfigs, HighScores, Minigame};

    /// Upper bound on any single run (about five minutes of play)
    const MAX_FRAMES: u32 = 18_000;

    const DEMO_SONGS: &str = r#"{
        "songs": [
            {
                "id": "jasmine_flower",
                "title": "Jasmine Flower",
                "subtitle": "Mo Li Hua",
                "duration": 30,
                "difficulty": "Novice",
                "difficulty_multiplier": 1.0,
                "backing": [
                    { "t": 0, "chord": [0, 4] },
                    { "t": 2000, "chord": [2, 5] }
                ],
                "notes": [
                    { "t": 500, "l": 0 },
                    { "t": 1000, "l": 1 },
                    { "t": 1500, "l": 2 },
                    { "t": 2000, "l": 3, "type": "hold", "len": 600 },
                    { "t": 3000, "l": 4 },
                    { "t": 3500, "l": 5 },
                    { "t": 4000, "l": 2, "type": "hold", "len": 400 }
                ]
            }
        ]
    }"#;

    pub fn run() -> Result<(), ConfigError> {
        let mut args = std::env::args().skip(1);
        let configs = match args.next() {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(json) => GameConfigs::from_json(&json)?,
                Err(err) => {
                    log::warn!("Cannot read {}: {}, using default tuning", path, err);
                    GameConfigs::default()
                }
            },
            None => GameConfigs::default(),
        };
        let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(0x5eed);
        log::info!("Jianghu minigames demo starting (seed {})", seed);

        let mut scores = HighScores::new();

        let mut archery = Archery::new(configs.archery.clone(), seed)?;
        archery.start();
        let summary = drive(&mut archery, play_archery);
        report(&mut scores, archery.id(), summary);

        let mut fishing = Fishing::new(configs.fishing.clone(), seed)?;
        fishing.start();
        let summary = drive(&mut fishing, play_fishing);
        report(&mut scores, fishing.id(), summary);

        let catalog = Catalog::from_json(DEMO_SONGS, configs.melody.lane_count())?;
        let mut melody = Melody::new(configs.melody.clone(), seed)?;
        for song in &catalog.songs {
            melody.select_song(song)?;
            let summary = drive(&mut melody, play_melody);
            report(&mut scores, &song.id, summary);
        }

        let mut horse = HorseTaming::new(configs.horse.clone(), seed)?;
        horse.start();
        let summary = drive(&mut horse, play_horse);
        if let Some(rank) = horse.rank() {
            log::info!("Horse taming rank: {:?}", rank);
        }
        report(&mut scores, horse.id(), summary);

        let mut pitch_pot = PitchPot::new(configs.pitch_pot.clone(), seed)?;
        pitch_pot.start(configs.pitch_pot.rounds);
        let summary = drive(&mut pitch_pot, play_pitch_pot);
        report(&mut scores, pitch_pot.id(), summary);

        match scores.to_json() {
            Ok(json) => log::debug!("High scores: {}", json),
            Err(err) => log::warn!("Cannot serialize high scores: {}", err),
        }
        Ok(())
    }

    /// Run frames until the session ends or the frame budget runs out
    fn drive<G: Minigame>(game: &mut G, mut bot: impl FnMut(&mut G)) -> Option<Summary> {
        for frame in 0..MAX_FRAMES {
            bot(game);
            game.frame(frame as f64 * DEMO_FRAME_MS);
            for event in game.drain_events() {
                log::trace!("{}: {:?}", game.id(), event);
            }
            if game.phase() == Phase::Ended {
                break;
            }
        }
        game.summary()
    }

    fn report(scores: &mut HighScores, key: &str, summary: Option<Summary>) {
        let Some(summary) = summary else {
            log::warn!("{}: session did not end within {} frames", key, MAX_FRAMES);
            return;
        };
        log::info!(
            "{}: {:?} with score {} (max combo {}, {} perfect / {} great / {} good / {} miss)",
            key,
            summary.end_reason,
            summary.final_score,
            summary.max_combo,
            summary.stats.perfect,
            summary.stats.great,
            summary.stats.good,
            summary.stats.miss,
        );
        let qualifies = scores.qualifies(key, summary.final_score);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0);
        match scores.submit(key, &summary, timestamp) {
            Some(rank) => log::info!("{}: entered the high score table at rank {}", key, rank),
            None if !qualifies => log::info!("{}: did not beat the high score table", key),
            None => {}
        }
    }

    fn key_down(c: char) -> InputEvent {
        InputEvent::KeyDown {
            key: Key::Char(c),
            repeat: false,
        }
    }

    fn key_up(c: char) -> InputEvent {
        InputEvent::KeyUp { key: Key::Char(c) }
    }

    /// Fire at the leading bird every quarter second, with focus on cooldown
    fn play_archery(game: &mut Archery) {
        if game.focus().is_ready() {
            let focus_key = game.config().focus_key;
            game.handle_input(key_down(focus_key));
            game.handle_input(key_up(focus_key));
        }
        if game.session().active_ms() % 250.0 > DEMO_FRAME_MS {
            return;
        }
        let target = game.entities().targets().next().map(|e| e.render_pos());
        if let Some(pos) = target {
            game.handle_input(InputEvent::PointerDown { pos });
            game.handle_input(InputEvent::PointerUp { pos });
        }
    }

    /// Cast near the top of the power swing, tap until the bite, then follow the zone
    fn play_fishing(game: &mut Fishing) {
        match game.stage() {
            FishingStage::Casting => {
                let pos = Vec2::ZERO;
                if game.power() >= 95.0 {
                    game.handle_input(InputEvent::PointerUp { pos });
                } else {
                    game.handle_input(InputEvent::PointerDown { pos });
                }
            }
            FishingStage::Waiting => {
                game.handle_input(InputEvent::KeyDown {
                    key: Key::Space,
                    repeat: false,
                });
                game.handle_input(InputEvent::KeyUp { key: Key::Space });
            }
            FishingStage::Struggle => {
                let x = game.zone().center_deg / 180.0 * game.config().width;
                game.handle_input(InputEvent::PointerMove {
                    pos: Vec2::new(x, 0.0),
                });
            }
        }
    }

    /// Press as heads cross the line, release as tails arrive
    fn play_melody(game: &mut Melody) {
        let hit_line = game.config().hit_line_y;
        let mut presses = Vec::new();
        let mut releases = Vec::new();
        for entity in game.entities().targets() {
            let Some(note) = entity.note() else {
                continue;
            };
            if note.holding {
                if entity.pos.y - note.length() >= hit_line - 6.0 {
                    releases.push(note.lane);
                }
            } else if (entity.pos.y - hit_line).abs() < 6.0 {
                presses.push((note.lane, note.is_hold()));
            }
        }

        let keys = game.config().lane_keys.clone();
        for (lane, hold) in presses {
            if let Some(&c) = keys.get(lane) {
                game.handle_input(key_down(c));
                if !hold {
                    game.handle_input(key_up(c));
                }
            }
        }
        for lane in releases {
            if let Some(&c) = keys.get(lane) {
                game.handle_input(key_up(c));
            }
        }
    }

    /// Press each prompt's key as it meets the ring
    fn play_horse(game: &mut HorseTaming) {
        let center = game.config().center();
        let radius = game.config().ring_radius;
        let due: Vec<char> = game
            .entities()
            .targets()
            .filter(|e| (e.pos.distance(center) - radius).abs() < 5.0)
            .filter_map(|e| e.prompt().map(|p| p.key))
            .collect();
        for c in due {
            game.handle_input(key_down(c));
            game.handle_input(key_up(c));
        }
    }

    /// Park the pointer on the mouse pot, steer the keys cursor onto the keys pot,
    /// and commit once everything is charged
    fn play_pitch_pot(game: &mut PitchPot) {
        let mut mouse_target = None;
        let mut keys_target = None;
        let mut all_full = true;
        let mut any = false;
        for entity in game.entities().targets() {
            let Some(pot) = entity.pot() else {
                continue;
            };
            any = true;
            all_full &= pot.charge >= 100.0;
            match pot.mode {
                PotMode::Mouse => mouse_target = Some(entity.pos),
                PotMode::Keys => keys_target = Some(entity.pos),
                PotMode::Hybrid => {
                    mouse_target = Some(entity.pos);
                    keys_target = Some(entity.pos);
                }
            }
        }

        if let Some(pos) = mouse_target {
            game.handle_input(InputEvent::PointerMove { pos });
        }
        if let Some(target) = keys_target {
            let delta = target - game.keys_cursor();
            steer(game, delta.x, 'a', 'd');
            steer(game, delta.y, 'w', 's');
        }
        if any && all_full {
            game.handle_input(InputEvent::KeyDown {
                key: Key::Space,
                repeat: false,
            });
            game.handle_input(InputEvent::KeyUp { key: Key::Space });
        }
    }

    fn steer(game: &mut PitchPot, delta: f32, negative: char, positive: char) {
        let (press, lift) = if delta > 5.0 {
            (Some(positive), negative)
        } else if delta < -5.0 {
            (Some(negative), positive)
        } else {
            (None, positive)
        };
        game.handle_input(key_up(lift));
        match press {
            Some(c) => game.handle_input(key_down(c)),
            None => game.handle_input(key_up(negative)),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = demo::run() {
        log::error!("Demo aborted: {}", err);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page; there is no standalone entry point
}
