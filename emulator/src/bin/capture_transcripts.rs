use std::io;

#[allow(dead_code)]
#[path = "../plant.rs"]
mod plant;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::ALL {
        record_profile(profile)?;
        println!("recorded {}", profile.log_path());
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Startup => &[
            "status",
            "supply bus 0.8",
            "run 20",
            "status",
            "comms lost",
            "run 5",
            "status",
            "comms ok",
            "run 20",
            "supply none",
            "run 40",
            "status",
        ],
        TranscriptProfile::Brake => &[
            "supply bus 0.8",
            "run 20",
            "brake trip",
            "run 3",
            "status",
            "brake release",
            "run 10",
            "status",
        ],
        TranscriptProfile::OverTemperature => &["supply bus 0.8", "run 80", "status"],
        TranscriptProfile::Reverse => &[
            "supply bus 0.8",
            "run 20",
            "direction boost",
            "supply pack 0.6",
            "run 30",
            "status",
        ],
    };

    for command in script {
        let _ = session.handle_command(command)?;
    }
    Ok(())
}
