use crate::config::Config;
use crate::history::History;
use crate::job::JobSet;

pub struct State {
	pub job_set: JobSet,
	pub history: History,
	pub config: Config,
}

impl State {
	pub fn new(config: Config) -> State {
		let history = History::new(config.history_size);
		State { job_set: JobSet::new(), history: history, config: config }
	}
}
