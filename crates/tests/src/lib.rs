
#[cfg(test)]
mod consultation_tests;
#[cfg(test)]
mod live_transcript_tests;
#[cfg(test)]
mod ownership_tests;
