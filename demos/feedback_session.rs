use std::path::PathBuf;
use std::time::Instant;

use tts_tuner::{
    platform::{
        loopback::{LoopbackSynthesizer, WavCapture},
        DirectorySaver, LogNotifier, Voice,
    },
    Session, SessionConfig, SliderValues,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&PathBuf::from(path))?,
        None => SessionConfig::default(),
    };

    // Voices arrive after startup, as they do on most platforms.
    let synth = LoopbackSynthesizer::lazy(vec![
        Voice::new("Alex", "en-US"),
        Voice::new("Daniel", "en-GB"),
        Voice::new("Amelie", "fr-CA"),
    ]);
    let mut session = Session::new(config, synth, WavCapture::new(), LogNotifier);
    session.initialize_model();

    if let Some(event) = session.synthesizer_mut().load_voices() {
        session.handle_event(event)?;
    }
    for option in session.voice_options() {
        println!("  {}", option.label);
    }

    session.set_text("Hello world. This is a tuned voice!");
    session.select_style(1)?;

    for round in 1..=3 {
        let start = Instant::now();
        session.speak()?;
        let request = session.synthesizer().current().cloned();

        let samples = session.synthesizer().render();
        session.capture_mut().feed(&samples);
        if let Some(ended) = session.synthesizer_mut().finish() {
            session.handle_event(ended)?;
        }
        for event in session.capture_mut().drain_events() {
            session.handle_event(event)?;
        }

        if let Some(request) = request {
            println!(
                "Round {round}: pitch={:.3} rate={:.3} voice={} ({} bytes in {:.2?})",
                request.pitch,
                request.rate,
                request.voice.map(|v| v.name).unwrap_or_else(|| "default".into()),
                session.artifact().map(|a| a.len()).unwrap_or(0),
                start.elapsed()
            );
        }

        let loss = session.submit_feedback(SliderValues::new(80, 40, 60))?;
        println!("Round {round}: feedback loss {loss:.5}");
    }

    let mut saver = DirectorySaver::new("output");
    if session.download(&mut saver)? {
        println!("Saved to {}", saver.dir().join(&session.config().download_filename).display());
    }
    Ok(())
}
