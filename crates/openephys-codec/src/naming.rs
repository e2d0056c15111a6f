//! File naming shared by the writer and reader.
//!
//! Stream and channel names drop spaces and map `_` to `-`, so that `_` stays a
//! field separator. Every name gains an `_<experiment>` suffix once the
//! experiment number is above one.

/// Strip spaces and replace underscores with dashes.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ')
        .map(|c| if c == '_' { '-' } else { c })
        .collect()
}

fn experiment_suffix(experiment: u32) -> String {
    if experiment > 1 {
        format!("_{experiment}")
    } else {
        String::new()
    }
}

/// Key identifying a stream across recordings: `<source id>_<stream name>`.
pub fn stream_key(source_node_id: u16, stream_name: &str) -> String {
    format!("{source_node_id}_{stream_name}")
}

/// `<source>_<stream>_<channel>[_<exp>].continuous`
pub fn continuous_file_name(
    source_node_id: u16,
    stream_name: &str,
    channel_name: &str,
    experiment: u32,
) -> String {
    format!(
        "{source_node_id}_{}_{}{}.continuous",
        sanitize_name(stream_name),
        sanitize_name(channel_name),
        experiment_suffix(experiment)
    )
}

/// `all_channels[_<exp>].events`
pub fn events_file_name(experiment: u32) -> String {
    format!("all_channels{}.events", experiment_suffix(experiment))
}

/// `messages[_<exp>].events`
pub fn messages_file_name(experiment: u32) -> String {
    format!("messages{}.events", experiment_suffix(experiment))
}

/// `<electrode>_<stream>_[_<exp>].spikes`
///
/// The separator before the experiment suffix is doubled; existing
/// recordings use that name.
pub fn spikes_file_name(electrode_name: &str, stream_name: &str, experiment: u32) -> String {
    format!(
        "{}_{}_{}.spikes",
        electrode_name.replace(' ', ""),
        sanitize_name(stream_name),
        experiment_suffix(experiment)
    )
}

/// `<source>_<stream>[_<exp>].timestamps`
pub fn timestamps_file_name(source_node_id: u16, stream_name: &str, experiment: u32) -> String {
    format!(
        "{source_node_id}_{}{}.timestamps",
        sanitize_name(stream_name),
        experiment_suffix(experiment)
    )
}

/// `structure[_<exp>].xml`
pub fn index_file_name(experiment: u32) -> String {
    format!("structure{}.xml", experiment_suffix(experiment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_name("example data_1"), "exampledata-1");
    }

    #[test]
    fn test_first_experiment_has_no_suffix() {
        assert_eq!(
            continuous_file_name(100, "example_data", "CH 1", 1),
            "100_example-data_CH1.continuous"
        );
        assert_eq!(events_file_name(1), "all_channels.events");
        assert_eq!(messages_file_name(1), "messages.events");
        assert_eq!(spikes_file_name("E 1", "stream", 1), "E1_stream_.spikes");
        assert_eq!(timestamps_file_name(100, "s 1", 1), "100_s1.timestamps");
        assert_eq!(index_file_name(1), "structure.xml");
    }

    #[test]
    fn test_later_experiments_are_suffixed() {
        assert_eq!(
            continuous_file_name(100, "stream", "CH1", 2),
            "100_stream_CH1_2.continuous"
        );
        assert_eq!(events_file_name(3), "all_channels_3.events");
        assert_eq!(messages_file_name(2), "messages_2.events");
        assert_eq!(spikes_file_name("E1", "stream", 2), "E1_stream__2.spikes");
        assert_eq!(index_file_name(2), "structure_2.xml");
    }

    #[test]
    fn test_electrode_underscores_are_kept() {
        assert_eq!(spikes_file_name("E_1", "s", 1), "E_1_s_.spikes");
    }
}
