use serde::{Deserialize, Serialize};

/// Bitmask asset taxonomy.
///
/// Every concrete asset carries exactly one `AssetType` value, but hybrid
/// instruments are composed from primitive flags (a bond ETF is
/// `STOCK | ETF | BOND`), so category checks are mask tests rather than
/// discriminant matches. See [`is_of_related_type`] and [`is_of_strict_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetType(pub u32);

impl AssetType {
    // ── Primitive flags ─────────────────────────────────────────────
    pub const CASH: AssetType = AssetType(1);
    pub const DEPOSIT: AssetType = AssetType(1 << 1);
    pub const BOND: AssetType = AssetType(1 << 2);
    pub const STOCK: AssetType = AssetType(1 << 3);
    pub const ETF: AssetType = AssetType(1 << 4);
    pub const FUND: AssetType = AssetType(1 << 5);
    pub const REAL_ESTATE: AssetType = AssetType(1 << 6);
    pub const P2P: AssetType = AssetType(1 << 7);
    pub const COMMODITY: AssetType = AssetType(1 << 8);
    pub const CRYPTO: AssetType = AssetType(1 << 9);
    pub const DEBT: AssetType = AssetType(1 << 10);

    // ── Composite categories ────────────────────────────────────────
    pub const STOCK_ETF: AssetType = AssetType(Self::STOCK.0 | Self::ETF.0);
    pub const BOND_ETF: AssetType = AssetType(Self::STOCK.0 | Self::ETF.0 | Self::BOND.0);
    pub const COMMODITY_ETF: AssetType =
        AssetType(Self::STOCK.0 | Self::ETF.0 | Self::COMMODITY.0);
    pub const REAL_ESTATE_ETF: AssetType =
        AssetType(Self::STOCK.0 | Self::ETF.0 | Self::REAL_ESTATE.0);
    pub const STOCK_FUND: AssetType = AssetType(Self::FUND.0 | Self::STOCK.0);
    pub const BOND_FUND: AssetType = AssetType(Self::FUND.0 | Self::BOND.0);

    /// Types a portfolio is broken down into on the dashboard.
    /// Funds and ETFs collapse into one of these via [`AssetType::broad_type`].
    pub const BROAD_TYPES: [AssetType; 9] = [
        Self::CASH,
        Self::DEPOSIT,
        Self::BOND,
        Self::STOCK,
        Self::REAL_ESTATE,
        Self::P2P,
        Self::COMMODITY,
        Self::CRYPTO,
        Self::DEBT,
    ];

    /// Every concrete type a user can create.
    pub const ALL: [AssetType; 17] = [
        Self::CASH,
        Self::DEPOSIT,
        Self::BOND,
        Self::STOCK,
        Self::REAL_ESTATE,
        Self::P2P,
        Self::COMMODITY,
        Self::CRYPTO,
        Self::DEBT,
        Self::STOCK_ETF,
        Self::BOND_ETF,
        Self::COMMODITY_ETF,
        Self::REAL_ESTATE_ETF,
        Self::STOCK_FUND,
        Self::BOND_FUND,
        Self::ETF,
        Self::FUND,
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: AssetType) -> AssetType {
        AssetType(self.0 | other.0)
    }

    /// Underlying type used for allocation: a bond ETF counts as a bond,
    /// a stock fund as a stock. Bond and commodity flags win over the
    /// STOCK flag every exchange-traded wrapper carries.
    pub fn broad_type(self) -> AssetType {
        const PRIORITY: [AssetType; 9] = [
            AssetType::DEBT,
            AssetType::CASH,
            AssetType::DEPOSIT,
            AssetType::P2P,
            AssetType::BOND,
            AssetType::COMMODITY,
            AssetType::REAL_ESTATE,
            AssetType::CRYPTO,
            AssetType::STOCK,
        ];
        PRIORITY
            .into_iter()
            .find(|&primitive| is_of_related_type(self, primitive))
            // Bare ETF / FUND wrappers without an underlying flag.
            .unwrap_or(AssetType::STOCK)
    }

    /// Position-based instruments priced per unit.
    pub fn is_tradeable(self) -> bool {
        !matches!(self, Self::CASH | Self::DEPOSIT | Self::DEBT)
    }

    /// Instruments paying interest on their own schedule.
    pub fn has_interest_schedule(self) -> bool {
        is_of_strict_type(self, Self::BOND) || is_of_strict_type(self, Self::P2P)
    }

    /// Cash and cash-equivalents (excluded from buy/sell rebalancing).
    pub fn is_cash_like(self) -> bool {
        matches!(self.broad_type(), Self::CASH | Self::DEPOSIT)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CASH => "Cash",
            Self::DEPOSIT => "Deposit",
            Self::BOND => "Bond",
            Self::STOCK => "Stock",
            Self::ETF => "ETF",
            Self::FUND => "Fund",
            Self::REAL_ESTATE => "Real Estate",
            Self::P2P => "P2P Loan",
            Self::COMMODITY => "Commodity",
            Self::CRYPTO => "Crypto",
            Self::DEBT => "Debt",
            Self::STOCK_ETF => "Stock ETF",
            Self::BOND_ETF => "Bond ETF",
            Self::COMMODITY_ETF => "Commodity ETF",
            Self::REAL_ESTATE_ETF => "Real Estate ETF",
            Self::STOCK_FUND => "Stock Fund",
            Self::BOND_FUND => "Bond Fund",
            _ => "Other",
        }
    }
}

impl std::ops::BitOr for AssetType {
    type Output = AssetType;

    fn bitor(self, rhs: AssetType) -> AssetType {
        self.union(rhs)
    }
}

impl std::ops::BitAnd for AssetType {
    type Output = AssetType;

    fn bitand(self, rhs: AssetType) -> AssetType {
        AssetType(self.0 & rhs.0)
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `asset_type` carries every flag of `mask` (a bond ETF is related to
/// both `BOND` and `STOCK`).
pub fn is_of_related_type(asset_type: AssetType, mask: AssetType) -> bool {
    mask.0 != 0 && asset_type.0 & mask.0 == mask.0
}

/// Exact match, used by per-type screens so a hybrid is listed once.
pub fn is_of_strict_type(asset_type: AssetType, mask: AssetType) -> bool {
    asset_type == mask
}

/// Exact match against any of the given types.
pub fn is_of_any_strict_type(asset_type: AssetType, masks: &[AssetType]) -> bool {
    masks.iter().any(|&m| is_of_strict_type(asset_type, m))
}
