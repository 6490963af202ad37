use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The hardware-validation test a pipeline run post-processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Sequencing,
    Inrush,
    Ber,
    LoadProfile,
    VoltageDynamics,
}

impl TestType {
    pub const ALL: [TestType; 5] = [
        TestType::Sequencing,
        TestType::Inrush,
        TestType::Ber,
        TestType::LoadProfile,
        TestType::VoltageDynamics,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            TestType::Sequencing => "Sequencing",
            TestType::Inrush => "Inrush",
            TestType::Ber => "BER",
            TestType::LoadProfile => "Load Profile",
            TestType::VoltageDynamics => "Voltage Dynamics",
        }
    }

    /// Prefix for artifact names written on behalf of this test
    pub fn file_prefix(&self) -> &'static str {
        match self {
            TestType::Sequencing => "sequencing",
            TestType::Inrush => "inrush",
            TestType::Ber => "ber",
            TestType::LoadProfile => "load_profile",
            TestType::VoltageDynamics => "voltage_dynamics",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "sequencing" | "powersequencing" => Ok(TestType::Sequencing),
            "inrush" => Ok(TestType::Inrush),
            "ber" | "biterrorratio" => Ok(TestType::Ber),
            "loadprofile" => Ok(TestType::LoadProfile),
            "voltagedynamics" | "dynamics" => Ok(TestType::VoltageDynamics),
            _ => Err(s.to_string()),
        }
    }
}

/// Grouping granularity for analysis report sheets, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterBy {
    Dut,
    Pba,
    Rework,
    Sample,
    Runid,
    Capture,
    Testpoint,
    #[default]
    Default,
}

impl FilterBy {
    /// How many leading key columns form a group (see `SampleKey::levels`).
    pub fn depth(&self) -> usize {
        match self {
            FilterBy::Default => 0,
            FilterBy::Dut => 1,
            FilterBy::Pba => 2,
            FilterBy::Rework => 3,
            FilterBy::Sample => 4,
            FilterBy::Runid => 5,
            FilterBy::Capture => 6,
            FilterBy::Testpoint => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterBy::Dut => "dut",
            FilterBy::Pba => "pba",
            FilterBy::Rework => "rework",
            FilterBy::Sample => "sample",
            FilterBy::Runid => "runid",
            FilterBy::Capture => "capture",
            FilterBy::Testpoint => "testpoint",
            FilterBy::Default => "default",
        }
    }
}

impl FromStr for FilterBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dut" => Ok(FilterBy::Dut),
            "pba" => Ok(FilterBy::Pba),
            "rework" => Ok(FilterBy::Rework),
            "sample" => Ok(FilterBy::Sample),
            "runid" => Ok(FilterBy::Runid),
            "capture" => Ok(FilterBy::Capture),
            "testpoint" => Ok(FilterBy::Testpoint),
            "default" | "" => Ok(FilterBy::Default),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_names_are_lenient() {
        assert_eq!("Load Profile".parse::<TestType>(), Ok(TestType::LoadProfile));
        assert_eq!("voltage_dynamics".parse::<TestType>(), Ok(TestType::VoltageDynamics));
        assert_eq!("BER".parse::<TestType>(), Ok(TestType::Ber));
        assert!("thermal".parse::<TestType>().is_err());
    }

    #[test]
    fn test_filter_depth_is_monotonic() {
        let order = [
            FilterBy::Default,
            FilterBy::Dut,
            FilterBy::Pba,
            FilterBy::Rework,
            FilterBy::Sample,
            FilterBy::Runid,
            FilterBy::Capture,
            FilterBy::Testpoint,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].depth() < pair[1].depth());
        }
        assert_eq!("".parse::<FilterBy>(), Ok(FilterBy::Default));
    }
}
