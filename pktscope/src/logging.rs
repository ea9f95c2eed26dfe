use crate::config::Config;
use common::logging::LogError;
use log::LevelFilter;

const LOG_FILE_TITLE: &str = "pktscope";

/// Log records go to stderr or to a dated file, never to stdout.
pub fn setup(config: &Config) -> Result<(), LogError> {
    let log_level = config.log_level()?;
    if log_level.eq(&LevelFilter::Off) {
        return Ok(());
    }

    let log_format = config.log_format.clone();
    let dispatch = fern::Dispatch::new()
        .level(log_level)
        .format(move |out, message, record| {
            let formatted = common::logging::parse_format(&log_format, message, record);

            out.finish(format_args!("{}", formatted))
        });

    let dispatch = if config.log_to_file {
        let file_name = common::logging::generate_file_name(LOG_FILE_TITLE);
        dispatch.chain(fern::log_file(file_name)?)
    } else {
        dispatch.chain(std::io::stderr())
    };

    dispatch.apply()?;

    Ok(())
}
