use {
    rotatelog::{RotateLogBuilder, TimeZone},
    std::{io::Write, time::Duration},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = RotateLogBuilder::new("./logs/daily_%d_%02d_%02d.log")
        .period(Duration::from_secs(24 * 60 * 60))
        .link("./logs/daily.log")
        .time_zone(TimeZone::UTC) // Turn over at UTC midnight
        .build()?;

    writeln!(logger, "System startup")?;
    writeln!(logger, "Configuration loaded successfully")?;
    writeln!(logger, "Server listening on port 8080")?;

    println!("writing to {:?}", logger.current_path());
    logger.close()?;
    Ok(())
}
