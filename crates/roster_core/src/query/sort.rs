//! Sort specification over whitelisted member columns.

/// Sortable member attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    Id,
    Username,
    Age,
    CreatedDate,
}

impl MemberField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "m.id",
            Self::Username => "m.username",
            Self::Age => "m.age",
            Self::CreatedDate => "m.created_date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: MemberField,
    pub direction: Direction,
}

/// Ordered list of sort keys. Rendering always appends `m.id ASC` as the
/// final tie-breaker so paging windows are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(direction: Direction, field: MemberField) -> Self {
        Self::unsorted().and(direction, field)
    }

    pub fn and(mut self, direction: Direction, field: MemberField) -> Self {
        self.orders.push(Order { field, direction });
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    pub(crate) fn render(&self) -> String {
        let mut keys: Vec<String> = self
            .orders
            .iter()
            .map(|order| format!("{} {}", order.field.column(), order.direction.keyword()))
            .collect();
        if !self
            .orders
            .iter()
            .any(|order| order.field == MemberField::Id)
        {
            keys.push("m.id ASC".to_string());
        }
        format!(" ORDER BY {}", keys.join(", "))
    }
}
