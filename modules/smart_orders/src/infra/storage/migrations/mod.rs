//! Database migrations for the smart orders service

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_accounts::Migration),
            Box::new(m20250301_000002_create_devices::Migration),
            Box::new(m20250301_000003_create_orders::Migration),
            Box::new(m20250301_000004_create_order_items::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Username,
    PasswordHash,
    IsModerator,
    IsActive,
    LastLogin,
    DateJoined,
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    Name,
    Model,
    AvgDataRate,
    DataPerHour,
    ImageKey,
    ImageUrl,
    Description,
    DescriptionAll,
    Protocol,
    Category,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    Status,
    ClientId,
    DraftClientId,
    Address,
    CreatedAt,
    FormedAt,
    CompletedAt,
    CompletionRequestedAt,
    ModeratorId,
    TotalTraffic,
    TrafficCalculated,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    OrderId,
    DeviceId,
    Quantity,
    CreatedAt,
}

mod m20250301_000001_create_accounts {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_accounts"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Accounts::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Accounts::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Accounts::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Accounts::IsModerator)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Accounts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Accounts::LastLogin).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Accounts::DateJoined)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Accounts::Table).to_owned())
                .await
        }
    }
}

mod m20250301_000002_create_devices {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_devices"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Devices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Devices::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Devices::Name).string().not_null())
                        .col(ColumnDef::new(Devices::Model).string().not_null().default(""))
                        .col(
                            ColumnDef::new(Devices::AvgDataRate)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Devices::DataPerHour)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(ColumnDef::new(Devices::ImageKey).string())
                        .col(ColumnDef::new(Devices::ImageUrl).string())
                        .col(ColumnDef::new(Devices::Description).text().not_null().default(""))
                        .col(
                            ColumnDef::new(Devices::DescriptionAll)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Devices::Protocol).string().not_null().default(""))
                        .col(
                            ColumnDef::new(Devices::Category)
                                .string_len(32)
                                .not_null()
                                .default("other"),
                        )
                        .col(
                            ColumnDef::new(Devices::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Devices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_devices_is_active")
                        .table(Devices::Table)
                        .col(Devices::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Devices::Table).to_owned())
                .await
        }
    }
}

mod m20250301_000003_create_orders {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_orders"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(32)
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Orders::ClientId).integer().not_null())
                        .col(ColumnDef::new(Orders::DraftClientId).integer())
                        .col(ColumnDef::new(Orders::Address).string().not_null().default(""))
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(ColumnDef::new(Orders::FormedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(Orders::CompletedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Orders::CompletionRequestedAt)
                                .timestamp_with_time_zone(),
                        )
                        .col(ColumnDef::new(Orders::ModeratorId).integer())
                        .col(
                            ColumnDef::new(Orders::TotalTraffic)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Orders::TrafficCalculated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_client")
                                .from(Orders::Table, Orders::ClientId)
                                .to(Accounts::Table, Accounts::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_moderator")
                                .from(Orders::Table, Orders::ModeratorId)
                                .to(Accounts::Table, Accounts::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // At most one draft per client
            manager
                .create_index(
                    Index::create()
                        .name("uq_orders_draft_client_id")
                        .table(Orders::Table)
                        .col(Orders::DraftClientId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_client_id")
                        .table(Orders::Table)
                        .col(Orders::ClientId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_status_formed_at")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .col(Orders::FormedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }
}

mod m20250301_000004_create_order_items {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_order_items"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::DeviceId).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .primary_key(
                            Index::create()
                                .col(OrderItems::OrderId)
                                .col(OrderItems::DeviceId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_device")
                                .from(OrderItems::Table, OrderItems::DeviceId)
                                .to(Devices::Table, Devices::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_items_device_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::DeviceId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }
}
