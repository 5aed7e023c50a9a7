use sea_orm_migration::prelude::*;

/// Raffles (抽奖活动表)
#[derive(DeriveIden)]
enum Raffles {
    Table,
    Id,
    Title,
    Description,
    TicketPriceCents,
    Currency,
    IsActive,
    MinNumber,
    MaxNumber,
    DrawDate,
    WinnerNumber,
    CreatedAt,
    UpdatedAt,
}

/// Contacts (WhatsApp 联系人及会话状态)
#[derive(DeriveIden)]
enum Contacts {
    Table,
    Id,
    WaId,
    Name,
    State,
    Context,
    LastInteractionAt,
    CreatedAt,
    UpdatedAt,
}

/// Orders (订单表)
#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    RaffleId,
    ContactId,
    Qty,
    TotalAmountCents,
    Status,
    PaymentProofMediaId,
    CancelReason,
    PaidAt,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

/// Tickets (号码票表, 每个活动范围内每个号码一行)
#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    RaffleId,
    Number,
    Status,
    OrderId,
    ReservedUntil,
    CreatedAt,
    UpdatedAt,
}

/// OrderTickets (订单-号码关联表)
#[derive(DeriveIden)]
enum OrderTickets {
    Table,
    Id,
    OrderId,
    TicketId,
    CreatedAt,
}

/// InboundMessages (入站消息表, wa_message_id 唯一用于幂等去重)
#[derive(DeriveIden)]
enum InboundMessages {
    Table,
    Id,
    WaMessageId,
    ContactId,
    Kind,
    Text,
    MediaId,
    RawPayload,
    Outcome,
    Processed,
    ReceivedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 状态均以字符串存储 (AVAILABLE/RESERVED/SOLD 等)，与实体层的
/// DeriveActiveEnum 一一对应。时间戳由应用层写入（SQLite 无 NOW()）。
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 抽奖活动表
        manager
            .create_table(
                Table::create()
                    .table(Raffles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Raffles::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Raffles::Title).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Raffles::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Raffles::TicketPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Raffles::Currency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(Raffles::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Raffles::MinNumber)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Raffles::MaxNumber).big_integer().not_null())
                    .col(ColumnDef::new(Raffles::DrawDate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Raffles::WinnerNumber).big_integer().null())
                    .col(ColumnDef::new(Raffles::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Raffles::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_raffles_is_active")
                    .table(Raffles::Table)
                    .col(Raffles::IsActive)
                    .to_owned(),
            )
            .await?;

        // 联系人表 (context 为 JSON 快照，每次转移整体替换)
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contacts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contacts::WaId).string_len(50).not_null())
                    .col(ColumnDef::new(Contacts::Name).string_len(255).null())
                    .col(
                        ColumnDef::new(Contacts::State)
                            .string_len(30)
                            .not_null()
                            .default("MENU"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Context)
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Contacts::LastInteractionAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Contacts::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Contacts::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // wa_id 唯一（一个终端用户一条记录）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contacts_wa_id_unique")
                    .table(Contacts::Table)
                    .col(Contacts::WaId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 订单表
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::RaffleId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::ContactId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Qty).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::TotalAmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(20)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Orders::PaymentProofMediaId)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::CancelReason).string_len(255).null())
                    .col(ColumnDef::new(Orders::PaidAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::ExpiresAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_raffle")
                            .from(Orders::Table, Orders::RaffleId)
                            .to(Raffles::Table, Raffles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_contact")
                            .from(Orders::Table, Orders::ContactId)
                            .to(Contacts::Table, Contacts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_expires_at")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .col(Orders::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_contact")
                    .table(Orders::Table)
                    .col(Orders::ContactId)
                    .to_owned(),
            )
            .await?;

        // 号码票表
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tickets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tickets::RaffleId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::Number).big_integer().not_null())
                    .col(
                        ColumnDef::new(Tickets::Status)
                            .string_len(20)
                            .not_null()
                            .default("AVAILABLE"),
                    )
                    .col(ColumnDef::new(Tickets::OrderId).big_integer().null())
                    .col(
                        ColumnDef::new(Tickets::ReservedUntil)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Tickets::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Tickets::UpdatedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_raffle")
                            .from(Tickets::Table, Tickets::RaffleId)
                            .to(Raffles::Table, Raffles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_order")
                            .from(Tickets::Table, Tickets::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // (raffle_id, number) 唯一：号码在活动内只生成一次
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_raffle_number_unique")
                    .table(Tickets::Table)
                    .col(Tickets::RaffleId)
                    .col(Tickets::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_raffle_status")
                    .table(Tickets::Table)
                    .col(Tickets::RaffleId)
                    .col(Tickets::Status)
                    .to_owned(),
            )
            .await?;

        // 过期扫描索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_status_reserved_until")
                    .table(Tickets::Table)
                    .col(Tickets::Status)
                    .col(Tickets::ReservedUntil)
                    .to_owned(),
            )
            .await?;

        // 订单-号码关联表
        manager
            .create_table(
                Table::create()
                    .table(OrderTickets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderTickets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderTickets::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(OrderTickets::TicketId).big_integer().not_null())
                    .col(
                        ColumnDef::new(OrderTickets::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_tickets_order")
                            .from(OrderTickets::Table, OrderTickets::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_tickets_ticket")
                            .from(OrderTickets::Table, OrderTickets::TicketId)
                            .to(Tickets::Table, Tickets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // (order_id, ticket_id) 唯一：一个号码同一订单只关联一次
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_tickets_unique")
                    .table(OrderTickets::Table)
                    .col(OrderTickets::OrderId)
                    .col(OrderTickets::TicketId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_tickets_ticket")
                    .table(OrderTickets::Table)
                    .col(OrderTickets::TicketId)
                    .to_owned(),
            )
            .await?;

        // 入站消息表
        manager
            .create_table(
                Table::create()
                    .table(InboundMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InboundMessages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InboundMessages::WaMessageId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InboundMessages::ContactId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InboundMessages::Kind)
                            .string_len(20)
                            .not_null()
                            .default("text"),
                    )
                    .col(ColumnDef::new(InboundMessages::Text).text().null())
                    .col(ColumnDef::new(InboundMessages::MediaId).string_len(255).null())
                    .col(ColumnDef::new(InboundMessages::RawPayload).json().null())
                    .col(ColumnDef::new(InboundMessages::Outcome).json().null())
                    .col(
                        ColumnDef::new(InboundMessages::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InboundMessages::ReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inbound_messages_contact")
                            .from(InboundMessages::Table, InboundMessages::ContactId)
                            .to(Contacts::Table, Contacts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // wa_message_id 唯一：重复投递的结构性保证
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inbound_messages_wa_message_id_unique")
                    .table(InboundMessages::Table)
                    .col(InboundMessages::WaMessageId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inbound_messages_contact")
                    .table(InboundMessages::Table)
                    .col(InboundMessages::ContactId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：关联/消息 -> 票 -> 订单 -> 联系人 -> 活动
        manager
            .drop_table(Table::drop().if_exists().table(InboundMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(OrderTickets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Tickets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Contacts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Raffles::Table).to_owned())
            .await?;

        Ok(())
    }
}
