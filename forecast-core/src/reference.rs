//! Which Australian state each observation station belongs to.

/// A state and the station locations in it, as displayed to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEntry {
    pub code: &'static str,
    pub cities: &'static [&'static str],
}

const AUSTRALIA: &[StateEntry] = &[
    StateEntry {
        code: "NSW",
        cities: &[
            "Albury",
            "Badgerys Creek",
            "Cobar",
            "Coffs Harbour",
            "Moree",
            "Newcastle",
            "Norah Head",
            "Norfolk Island",
            "Penrith",
            "Richmond",
            "Sydney",
            "Sydney Airport",
            "Wagga Wagga",
            "Williamtown",
            "Wollongong",
        ],
    },
    StateEntry {
        code: "VIC",
        cities: &[
            "Ballarat",
            "Bendigo",
            "Sale",
            "Melbourne Airport",
            "Melbourne",
            "Mildura",
            "Nhil",
            "Portland",
            "Watsonia",
            "Dartmoor",
        ],
    },
    StateEntry {
        code: "QLD",
        cities: &["Brisbane", "Cairns", "Gold Coast", "Townsville"],
    },
    StateEntry {
        code: "SA",
        cities: &["Adelaide", "Mount Gambier", "Nuriootpa", "Woomera"],
    },
    StateEntry {
        code: "WA",
        cities: &[
            "Albany",
            "Witchcliffe",
            "Pearce RAAF",
            "Perth Airport",
            "Perth",
            "Salmon Gums",
            "Walpole",
        ],
    },
    StateEntry {
        code: "TAS",
        cities: &["Hobart", "Launceston"],
    },
    StateEntry {
        code: "NT",
        cities: &["Alice Springs", "Darwin", "Katherine", "Uluru"],
    },
    StateEntry {
        code: "ACT",
        cities: &["Canberra", "Tuggeranong", "Mount Ginini"],
    },
];

/// Immutable state/city lookup. Obtain it with [`ReferenceData::australia`]
/// and pass it around by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceData {
    states: &'static [StateEntry],
}

impl ReferenceData {
    pub const fn australia() -> &'static ReferenceData {
        const DATA: ReferenceData = ReferenceData { states: AUSTRALIA };
        &DATA
    }

    pub fn states(&self) -> &'static [StateEntry] {
        self.states
    }

    /// State code for a city, ignoring whitespace and ASCII case, so both
    /// "Melbourne Airport" and "MelbourneAirport" resolve.
    pub fn state_of(&self, city: &str) -> Option<&'static str> {
        let wanted = canonical_location(city);
        self.states
            .iter()
            .find(|state| {
                state
                    .cities
                    .iter()
                    .any(|c| canonical_location(c).eq_ignore_ascii_case(&wanted))
            })
            .map(|state| state.code)
    }

    pub fn cities_in(&self, state: &str) -> Option<&'static [&'static str]> {
        self.states
            .iter()
            .find(|s| s.code.eq_ignore_ascii_case(state.trim()))
            .map(|s| s.cities)
    }

    pub fn contains(&self, city: &str) -> bool {
        self.state_of(city).is_some()
    }

    /// Every city paired with its state code, in display order.
    pub fn cities(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.states
            .iter()
            .flat_map(|state| state.cities.iter().map(move |city| (state.code, *city)))
    }
}

/// The dataset spells locations without spaces ("Melbourne Airport" is
/// `MelbourneAirport`).
pub fn canonical_location(name: &str) -> String {
    name.split_whitespace().collect()
}
