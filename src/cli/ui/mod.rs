mod listen_view;
mod outcome_view;
mod painter;
mod params_view;
mod record_view;
mod spinner;
mod status_view;
mod table;

pub(crate) use self::listen_view::{ListenReadyView, ListenSummaryView, SampleLineView};
pub(crate) use self::outcome_view::OutcomeView;
pub(crate) use self::painter::Painter;
pub(crate) use self::spinner::Spinner;
